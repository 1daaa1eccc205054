//! Polls the streaming-service HTTP API (current playback + queue) using a
//! refreshable OAuth2 token. Grounded on
//! `CodedNil-cantus::spotify::update_state_from_spotify`.

use super::{Capabilities, ControlCommand, MediaSource, SourceConfig};
use async_trait::async_trait;
use lyricline_common::{AppError, PlaybackSnapshot, SourceId, TrackKey};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: String,
}

pub struct SpotifySource {
    http: reqwest::Client,
    oauth: BasicClient,
    token_path: PathBuf,
    token: Arc<RwLock<Option<StoredToken>>>,
    /// Mirrors the current access token alone, shared with
    /// `StreamingInternalProvider` so C4 can reuse this source's OAuth
    /// session without depending on the rest of `StoredToken`.
    access_token_handle: Arc<RwLock<Option<String>>>,
}

impl SpotifySource {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        token_path: PathBuf,
    ) -> anyhow::Result<Self> {
        let oauth = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new("https://accounts.spotify.com/authorize".to_string())?,
            Some(TokenUrl::new(
                "https://accounts.spotify.com/api/token".to_string(),
            )?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_uri)?);

        let token = if token_path.exists() {
            std::fs::read(&token_path)
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        } else {
            None
        };

        let access_token_handle = Arc::new(RwLock::new(
            token.as_ref().map(|t: &StoredToken| t.access_token.clone()),
        ));

        Ok(Self {
            http: reqwest::Client::new(),
            oauth,
            token_path,
            token: Arc::new(RwLock::new(token)),
            access_token_handle,
        })
    }

    /// A shared handle mirroring this source's current access token, for
    /// consumers (the streaming-service internal lyrics provider) that need
    /// read access without depending on the OAuth refresh machinery.
    pub fn access_token_handle(&self) -> Arc<RwLock<Option<String>>> {
        self.access_token_handle.clone()
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.access_token.clone());
        }
        self.refresh().await
    }

    async fn refresh(&self) -> anyhow::Result<String> {
        let refresh_token = {
            self.token
                .read()
                .await
                .as_ref()
                .map(|t| t.refresh_token.clone())
        };
        let Some(refresh_token) = refresh_token else {
            anyhow::bail!(AppError::misconfigured(
                "no streaming-service refresh token on disk; complete OAuth out of band"
            ));
        };
        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(oauth2::reqwest::async_http_client)
            .await?;
        let stored = StoredToken {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .unwrap_or(refresh_token),
        };
        lyricline_common::durable::write_json_atomic(&self.token_path, &stored)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&self.token_path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(&self.token_path, perms);
            }
        }
        let access_token = stored.access_token.clone();
        *self.token.write().await = Some(stored);
        *self.access_token_handle.write().await = Some(access_token.clone());
        Ok(access_token)
    }
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    item: Option<Track>,
    progress_ms: Option<u64>,
    is_playing: bool,
    shuffle_state: Option<bool>,
    repeat_state: Option<String>,
    device: Option<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    volume_percent: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: String,
    name: String,
    duration_ms: u64,
    artists: Vec<Artist>,
    album: Album,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl MediaSource for SpotifySource {
    fn name(&self) -> SourceId {
        SourceId::new("spotify")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            play_pause: true,
            next_prev: true,
            seek: true,
            volume: true,
            shuffle_repeat: true,
            like: true,
            queue: true,
        }
    }

    fn config(&self) -> SourceConfig {
        SourceConfig {
            priority: 10,
            ..Default::default()
        }
    }

    async fn snapshot(&self) -> anyhow::Result<Option<PlaybackSnapshot>> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{API_BASE}/me/player/currently-playing"))
            .bearer_auth(&token)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let token = self.refresh().await?;
            let response = self
                .http
                .get(format!("{API_BASE}/me/player/currently-playing"))
                .bearer_auth(&token)
                .send()
                .await?;
            return self.parse_response(response).await;
        }
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        self.parse_response(response).await
    }

    async fn control(&self, cmd: ControlCommand) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let (method, path, body): (reqwest::Method, &str, Option<serde_json::Value>) = match cmd {
            ControlCommand::Play | ControlCommand::TogglePlay => {
                (reqwest::Method::PUT, "me/player/play", None)
            }
            ControlCommand::Pause => (reqwest::Method::PUT, "me/player/pause", None),
            ControlCommand::SkipNext => (reqwest::Method::POST, "me/player/next", None),
            ControlCommand::SkipPrev => (reqwest::Method::POST, "me/player/previous", None),
            ControlCommand::SetVolume(v) => (
                reqwest::Method::PUT,
                "me/player/volume",
                Some(serde_json::json!({ "volume_percent": (v * 100.0) as u32 })),
            ),
            ControlCommand::SetShuffle(on) => (
                reqwest::Method::PUT,
                "me/player/shuffle",
                Some(serde_json::json!({ "state": on })),
            ),
            other => anyhow::bail!("streaming-service source does not support {other:?}"),
        };
        let url = format!("{API_BASE}/{path}");
        let mut request = self.http.request(method, url).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await?;
        Ok(())
    }
}

impl SpotifySource {
    async fn parse_response(
        &self,
        response: reqwest::Response,
    ) -> anyhow::Result<Option<PlaybackSnapshot>> {
        if !response.status().is_success() {
            return Ok(None);
        }
        let body: CurrentlyPlaying = response.json().await?;
        let Some(item) = body.item else {
            return Ok(None);
        };
        if item.name.trim().is_empty() {
            return Ok(None);
        }
        let primary_artist = item
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        let mut provenance = HashMap::new();
        provenance.insert("spotify_track_id".to_string(), item.id.clone());

        Ok(Some(PlaybackSnapshot {
            source_id: self.name(),
            sampled_at_ms: now_ms(),
            track_key: TrackKey::from_service_id(&item.id),
            title: item.name,
            artist: primary_artist,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            album: Some(item.album.name),
            album_art_uri: item.album.images.into_iter().map(|i| i.url).next(),
            duration_ms: Some(item.duration_ms),
            position_ms: body.progress_ms,
            is_playing: body.is_playing,
            liked: None,
            shuffle: body.shuffle_state,
            repeat: body.repeat_state.map(|s| match s.as_str() {
                "track" => 2,
                "context" => 1,
                _ => 0,
            }),
            volume: body.device.and_then(|d| d.volume_percent).map(|v| v / 100.0),
            provenance,
            extra: HashMap::new(),
        }))
    }
}
