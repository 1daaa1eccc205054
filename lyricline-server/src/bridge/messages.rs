//! Strongly-typed message variants for the bridge-hub WebSocket boundary.
//! Unknown message kinds are logged and ignored, never force a disconnect,
//! per the design note on dynamic JSON blobs at this boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PositionReport {
    pub position_ms: u64,
    pub is_playing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackDataReport {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    /// Audio analysis / colors, if the extension could compute them.
    #[serde(default)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromExtension {
    Position(PositionReport),
    TrackData(TrackDataReport),
    Pong,
    ControlAck(ControlAck),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off = 0,
    Context = 1,
    Track = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum ControlEnvelope {
    Play,
    Pause,
    TogglePlay,
    SkipNext,
    SkipPrev,
    Seek(u64),
    SeekBy(i64),
    PlayUri(String),
    SetVolume(f32),
    IncreaseVolume,
    DecreaseVolume,
    SetMute(bool),
    ToggleMute,
    SetShuffle(bool),
    ToggleShuffle,
    SetRepeat(u8),
    ToggleRepeat,
    SetHeart(bool),
    ToggleHeart,
    AddToQueue(String),
    ClearQueue,
    GetQueue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToExtension {
    Ping,
    RequestState,
    RequestTrackData,
    Control { request_id: u64, command: ControlEnvelope },
}

/// Reply to a dispatched `Control` command, correlated back to the caller
/// via `request_id`. Per the bridge's command/ack contract: each dispatched
/// command eventually receives exactly one ack with a success flag and an
/// optional error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAck {
    pub request_id: u64,
    pub success: bool,
    pub error: Option<String>,
}
