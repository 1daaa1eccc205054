//! Polls `org.mpris.MediaPlayer2.*` over D-Bus. Grounded on
//! `CodedNil-cantus::spotify::update_state_from_mpris`: one property read
//! per tick, track-id-keyed change detection via zbus's `Properties`
//! proxy.

use super::{Capabilities, ControlCommand, MediaSource, SourceConfig};
use async_trait::async_trait;
use lyricline_common::{PlaybackSnapshot, SourceId, TrackKey};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use zbus::Connection;

pub struct MprisSource {
    connection: Connection,
    player_bus_name: String,
}

impl MprisSource {
    pub async fn connect(player_bus_name: impl Into<String>) -> anyhow::Result<Self> {
        let connection = Connection::session().await?;
        Ok(Self {
            connection,
            player_bus_name: player_bus_name.into(),
        })
    }

    async fn read_properties(&self) -> anyhow::Result<HashMap<String, zbus::zvariant::OwnedValue>> {
        let proxy = zbus::fdo::PropertiesProxy::builder(&self.connection)
            .destination(self.player_bus_name.clone())?
            .path("/org/mpris/MediaPlayer2")?
            .build()
            .await?;
        let props = proxy.get_all("org.mpris.MediaPlayer2.Player").await?;
        Ok(props)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl MediaSource for MprisSource {
    fn name(&self) -> SourceId {
        SourceId::new("mpris")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            play_pause: true,
            next_prev: true,
            seek: true,
            volume: true,
            shuffle_repeat: true,
            like: false,
            queue: false,
        }
    }

    fn config(&self) -> SourceConfig {
        SourceConfig {
            priority: 5,
            ..Default::default()
        }
    }

    async fn snapshot(&self) -> anyhow::Result<Option<PlaybackSnapshot>> {
        let props = match self.read_properties().await {
            Ok(props) => props,
            Err(_) => return Ok(None),
        };

        let playback_status = props
            .get("PlaybackStatus")
            .and_then(|v| String::try_from(v.clone()).ok())
            .unwrap_or_default();
        if playback_status.is_empty() {
            return Ok(None);
        }
        let is_playing = playback_status == "Playing";

        let metadata = props.get("Metadata");
        let (title, artist, album, duration_ms, art_uri) = match metadata {
            Some(value) => {
                let dict = zbus::zvariant::Dict::try_from(value.clone()).ok();
                let title = dict
                    .as_ref()
                    .and_then(|d| d.get::<str, String>("xesam:title").ok().flatten());
                let artist = dict.as_ref().and_then(|d| {
                    d.get::<str, Vec<String>>("xesam:artist")
                        .ok()
                        .flatten()
                        .and_then(|v| v.into_iter().next())
                });
                let album = dict
                    .as_ref()
                    .and_then(|d| d.get::<str, String>("xesam:album").ok().flatten());
                let duration_us = dict
                    .as_ref()
                    .and_then(|d| d.get::<str, i64>("mpris:length").ok().flatten());
                let art_uri = dict
                    .as_ref()
                    .and_then(|d| d.get::<str, String>("mpris:artUrl").ok().flatten());
                (
                    title,
                    artist,
                    album,
                    duration_us.map(|us| (us / 1000) as u64),
                    art_uri,
                )
            }
            None => (None, None, None, None, None),
        };

        let title = title.unwrap_or_default();
        let artist = artist.unwrap_or_default();
        if title.trim().is_empty() {
            return Ok(None);
        }

        let position_ms = props
            .get("Position")
            .and_then(|v| i64::try_from(v.clone()).ok())
            .map(|us| (us / 1000) as u64);

        let volume = props
            .get("Volume")
            .and_then(|v| f64::try_from(v.clone()).ok())
            .map(|v| v as f32);

        let track_key = TrackKey::normalize(&artist, &title);

        Ok(Some(PlaybackSnapshot {
            source_id: self.name(),
            sampled_at_ms: now_ms(),
            track_key,
            title,
            artist: artist.clone(),
            artists: vec![artist],
            album,
            album_art_uri: art_uri,
            duration_ms,
            position_ms,
            is_playing,
            liked: None,
            shuffle: None,
            repeat: None,
            volume,
            provenance: HashMap::new(),
            extra: HashMap::new(),
        }))
    }

    async fn control(&self, cmd: ControlCommand) -> anyhow::Result<()> {
        let proxy = zbus::Proxy::new(
            &self.connection,
            self.player_bus_name.clone(),
            "/org/mpris/MediaPlayer2",
            "org.mpris.MediaPlayer2.Player",
        )
        .await?;
        match cmd {
            ControlCommand::Play => proxy.call_method("Play", &()).await.map(|_| ())?,
            ControlCommand::Pause => proxy.call_method("Pause", &()).await.map(|_| ())?,
            ControlCommand::TogglePlay => proxy.call_method("PlayPause", &()).await.map(|_| ())?,
            ControlCommand::SkipNext => proxy.call_method("Next", &()).await.map(|_| ())?,
            ControlCommand::SkipPrev => proxy.call_method("Previous", &()).await.map(|_| ())?,
            other => anyhow::bail!("mpris source does not support {other:?}"),
        }
        Ok(())
    }
}
