//! Process configuration: CLI flags layered over the environment-variable
//! table from the external-interfaces section, following the teacher's
//! `Args` + `Config::load` split.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lyricline-server", about = "Self-hosted synchronized-lyrics server")]
pub struct Args {
    /// Overrides the data root (default: the user data directory).
    #[arg(long, env = "LYRICLINE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub server_port: u16,
    pub server_https_port: u16,
    pub bind_all_interfaces: bool,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
    pub fanart_tv_api_key: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub music_assistant_url: Option<String>,
    pub music_assistant_latency_ms: u64,
    pub update_interval_ms: u64,
    pub blur_strength_px: u32,
    pub overlay_opacity: f32,
    pub log_level: String,
}

fn env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn load(args: &Args) -> Self {
        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("lyricline")))
            .unwrap_or_else(|| PathBuf::from(".lyricline"));

        Self {
            data_dir,
            server_port: env_u16("SERVER_PORT", 9012),
            server_https_port: env_u16("SERVER_HTTPS_PORT", 9013),
            bind_all_interfaces: env_bool("LYRICLINE_BIND_ALL_INTERFACES", false),
            spotify_client_id: env_str("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: env_str("SPOTIFY_CLIENT_SECRET"),
            spotify_redirect_uri: env_str("SPOTIFY_REDIRECT_URI"),
            fanart_tv_api_key: env_str("FANART_TV_API_KEY"),
            lastfm_api_key: env_str("LASTFM_API_KEY"),
            music_assistant_url: env_str("MUSIC_ASSISTANT_URL"),
            music_assistant_latency_ms: env_u64("MUSIC_ASSISTANT_LATENCY_MS", 0),
            update_interval_ms: env_u64("UPDATE_INTERVAL_MS", 200),
            blur_strength_px: env_u32("BLUR_STRENGTH_PX", 24),
            overlay_opacity: env_f32("OVERLAY_OPACITY", 0.85),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn spotify_configured(&self) -> bool {
        self.spotify_client_id.is_some()
            && self.spotify_client_secret.is_some()
            && self.spotify_redirect_uri.is_some()
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn lyrics_dir(&self) -> PathBuf {
        self.data_dir.join("lyrics")
    }

    pub fn art_dir(&self) -> PathBuf {
        self.data_dir.join("art")
    }

    pub fn artists_dir(&self) -> PathBuf {
        self.data_dir.join("artists")
    }

    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("lyricline.lock")
    }

    pub fn cert_path(&self) -> PathBuf {
        self.data_dir.join("cert.pem")
    }

    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join("key.pem")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_documented_ports() {
        let args = Args { data_dir: Some(PathBuf::from("/tmp/lyricline-test")) };
        let cfg = Config::load(&args);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/lyricline-test"));
    }
}
