//! Polls a Music Assistant HTTP endpoint. `latency_ms` compensates the
//! reported position for known network latency before it reaches the
//! fuser.

use super::{Capabilities, ControlCommand, MediaSource, SourceConfig};
use async_trait::async_trait;
use lyricline_common::{PlaybackSnapshot, SourceId, TrackKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct MusicAssistantSource {
    http: reqwest::Client,
    base_url: String,
    latency_ms: u64,
}

impl MusicAssistantSource {
    pub fn new(base_url: String, latency_ms: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            latency_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueueState {
    current_item: Option<QueueItem>,
    elapsed_time: Option<f64>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueItem {
    name: String,
    duration: Option<f64>,
    artists: Vec<String>,
    image_url: Option<String>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl MediaSource for MusicAssistantSource {
    fn name(&self) -> SourceId {
        SourceId::new("music_assistant")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            play_pause: true,
            next_prev: true,
            seek: false,
            volume: false,
            shuffle_repeat: false,
            like: false,
            queue: true,
        }
    }

    fn config(&self) -> SourceConfig {
        SourceConfig {
            priority: 3,
            poll_period: Duration::from_secs(1),
            ..Default::default()
        }
    }

    async fn snapshot(&self) -> anyhow::Result<Option<PlaybackSnapshot>> {
        let response = self
            .http
            .get(format!("{}/api/queue", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let state: QueueState = response.json().await?;
        let Some(item) = state.current_item else {
            return Ok(None);
        };
        if item.name.trim().is_empty() {
            return Ok(None);
        }
        let is_playing = state.state.as_deref() == Some("playing");
        let artist = item.artists.first().cloned().unwrap_or_default();
        let position_ms = state
            .elapsed_time
            .map(|secs| (secs * 1000.0) as u64 + self.latency_ms);

        Ok(Some(PlaybackSnapshot {
            source_id: self.name(),
            sampled_at_ms: now_ms(),
            track_key: TrackKey::normalize(&artist, &item.name),
            title: item.name,
            artist: artist.clone(),
            artists: item.artists,
            album: None,
            album_art_uri: item.image_url,
            duration_ms: item.duration.map(|d| (d * 1000.0) as u64),
            position_ms,
            is_playing,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            provenance: HashMap::new(),
            extra: HashMap::new(),
        }))
    }

    async fn control(&self, cmd: ControlCommand) -> anyhow::Result<()> {
        let path = match cmd {
            ControlCommand::Play => "play",
            ControlCommand::Pause => "pause",
            ControlCommand::TogglePlay => "play_pause",
            ControlCommand::SkipNext => "next",
            ControlCommand::SkipPrev => "previous",
            other => anyhow::bail!("music assistant source does not support {other:?}"),
        };
        self.http
            .post(format!("{}/api/queue/{path}", self.base_url))
            .send()
            .await?;
        Ok(())
    }
}
