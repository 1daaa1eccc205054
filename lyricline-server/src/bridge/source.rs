//! Adapts [`super::BridgeHub`]'s extrapolated position into a C1
//! `MediaSource`. No polling of its own beyond reading the hub's
//! already-pushed state.

use super::messages::ControlEnvelope;
use super::BridgeHub;
use crate::sources::{Capabilities, ControlCommand, MediaSource, SourceConfig};
use async_trait::async_trait;
use lyricline_common::{PlaybackSnapshot, SourceId};
use std::sync::Arc;
use std::time::Duration;

pub struct BridgeSource {
    hub: Arc<BridgeHub>,
    paused_timeout: Duration,
}

impl BridgeSource {
    pub fn new(hub: Arc<BridgeHub>, paused_timeout: Duration) -> Self {
        Self { hub, paused_timeout }
    }
}

#[async_trait]
impl MediaSource for BridgeSource {
    fn name(&self) -> SourceId {
        SourceId::new("bridge")
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
            priority: 8,
            poll_period: Duration::from_millis(100),
            paused_timeout: self.paused_timeout,
        }
    }

    async fn snapshot(&self) -> anyhow::Result<Option<PlaybackSnapshot>> {
        Ok(self.hub.latest_snapshot(self.paused_timeout).await)
    }

    async fn control(&self, cmd: ControlCommand) -> anyhow::Result<()> {
        let envelope = match cmd {
            ControlCommand::Play => ControlEnvelope::Play,
            ControlCommand::Pause => ControlEnvelope::Pause,
            ControlCommand::TogglePlay => ControlEnvelope::TogglePlay,
            ControlCommand::SkipNext => ControlEnvelope::SkipNext,
            ControlCommand::SkipPrev => ControlEnvelope::SkipPrev,
            ControlCommand::Seek(ms) => ControlEnvelope::Seek(ms),
            ControlCommand::SeekBy(ms) => ControlEnvelope::SeekBy(ms),
            ControlCommand::PlayUri(uri) => ControlEnvelope::PlayUri(uri),
            ControlCommand::SetVolume(v) => ControlEnvelope::SetVolume(v),
            ControlCommand::IncreaseVolume => ControlEnvelope::IncreaseVolume,
            ControlCommand::DecreaseVolume => ControlEnvelope::DecreaseVolume,
            ControlCommand::SetMute(m) => ControlEnvelope::SetMute(m),
            ControlCommand::ToggleMute => ControlEnvelope::ToggleMute,
            ControlCommand::SetShuffle(s) => ControlEnvelope::SetShuffle(s),
            ControlCommand::ToggleShuffle => ControlEnvelope::ToggleShuffle,
            ControlCommand::SetRepeat(r) => ControlEnvelope::SetRepeat(r),
            ControlCommand::ToggleRepeat => ControlEnvelope::ToggleRepeat,
            ControlCommand::SetHeart(h) => ControlEnvelope::SetHeart(h),
            ControlCommand::ToggleHeart => ControlEnvelope::ToggleHeart,
            ControlCommand::AddToQueue(uri) => ControlEnvelope::AddToQueue(uri),
            ControlCommand::ClearQueue => ControlEnvelope::ClearQueue,
            ControlCommand::GetQueue => ControlEnvelope::GetQueue,
        };
        let ack = self.hub.broadcast_control(envelope).await;
        if ack.success {
            Ok(())
        } else {
            anyhow::bail!(ack.error.unwrap_or_else(|| "control command failed".to_string()))
        }
    }
}
