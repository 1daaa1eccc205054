//! C1 — Source Registry.
//!
//! A source is a polymorphic provider of `PlaybackSnapshot`s. Each enabled
//! source is driven on its own ticker; a source that errors twice in a row
//! is placed in "cooling" with exponential backoff and surfaces a
//! diagnostic without terminating the process. Grounded on the teacher's
//! `PlaybackEngine` task-per-subsystem shape.

pub mod mpris;
pub mod music_assistant;
pub mod spotify;

use async_trait::async_trait;
use lyricline_common::{PlaybackSnapshot, SourceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::RwLock;

/// Control commands C7 may delegate to a capable source.
#[derive(Debug, Clone)]
pub enum ControlCommand {
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

#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub play_pause: bool,
    pub next_prev: bool,
    pub seek: bool,
    pub volume: bool,
    pub shuffle_repeat: bool,
    pub like: bool,
    pub queue: bool,
}

/// Per-source tuning: poll period and stickiness/priority for the fuser.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub priority: u8,
    pub poll_period: Duration,
    /// `0` means sticky forever (never aged out by `paused_timeout`).
    pub paused_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            priority: 0,
            poll_period: Duration::from_secs(1),
            paused_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> SourceId;
    fn capabilities(&self) -> Capabilities;
    fn config(&self) -> SourceConfig;

    /// Polls the source once. `None` means "not currently reporting".
    async fn snapshot(&self) -> anyhow::Result<Option<PlaybackSnapshot>>;

    async fn control(&self, _cmd: ControlCommand) -> anyhow::Result<()> {
        Ok(())
    }
}

enum BackoffState {
    Healthy,
    Cooling { consecutive_errors: u32, until: tokio::time::Instant },
}

/// Drives one source's ticker loop, publishing snapshots into a
/// single-slot mailbox and applying the cooling/backoff policy on repeated
/// errors. The mailbox always holds only the most recent snapshot: a slow
/// consumer never backpressures the poll loop, and an unconsumed older
/// snapshot for this source is simply overwritten rather than queued.
pub async fn run_source_loop(
    source: Arc<dyn MediaSource>,
    blocklist: Arc<RwLock<Vec<String>>>,
    tx: watch::Sender<Option<PlaybackSnapshot>>,
) {
    let config = source.config();
    let mut backoff = BackoffState::Healthy;
    let mut interval = tokio::time::interval(config.poll_period);

    loop {
        interval.tick().await;

        if let BackoffState::Cooling { until, .. } = &backoff {
            if tokio::time::Instant::now() < *until {
                continue;
            }
        }

        match source.snapshot().await {
            Ok(Some(snapshot)) => {
                backoff = BackoffState::Healthy;
                let blocked = blocklist.read().await;
                if blocked.iter().any(|b| b == snapshot.source_id.as_str()) {
                    continue;
                }
                drop(blocked);
                if let Some(snapshot) = snapshot.validate_and_clamp() {
                    let _ = tx.send(Some(snapshot));
                }
            }
            Ok(None) => {
                backoff = BackoffState::Healthy;
            }
            Err(err) => {
                let consecutive_errors = match backoff {
                    BackoffState::Cooling { consecutive_errors, .. } => consecutive_errors + 1,
                    BackoffState::Healthy => 1,
                };
                tracing::warn!(source = %source.name(), error = %err, consecutive_errors, "source poll failed");
                if consecutive_errors >= 2 {
                    let backoff_secs = (1u64 << consecutive_errors.min(5)).min(30);
                    backoff = BackoffState::Cooling {
                        consecutive_errors,
                        until: tokio::time::Instant::now() + Duration::from_secs(backoff_secs),
                    };
                } else {
                    backoff = BackoffState::Cooling {
                        consecutive_errors,
                        until: tokio::time::Instant::now(),
                    };
                }
            }
        }
    }
}

/// Forwards each change of a source's single-slot mailbox into the shared
/// channel the fuser reads from. Uses `try_send` rather than blocking: if
/// the fuser is behind, the forwarded snapshot is dropped in favor of
/// whatever the mailbox holds next, never stalling this source's own loop.
pub async fn forward_latest_snapshot(
    mut rx: watch::Receiver<Option<PlaybackSnapshot>>,
    tx: mpsc::Sender<PlaybackSnapshot>,
) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if let Some(snapshot) = snapshot {
            if tx.try_send(snapshot).is_err() {
                tracing::debug!("fuser snapshot channel full, dropping forwarded snapshot");
            }
        }
    }
}

/// Holds every configured source and the control-command routing table.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn MediaSource>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Arc<dyn MediaSource>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Arc<dyn MediaSource>] {
        &self.sources
    }

    pub fn by_name(&self, name: &SourceId) -> Option<Arc<dyn MediaSource>> {
        self.sources.iter().find(|s| &s.name() == name).cloned()
    }

    /// Dispatches a control command to the first capable source, matching
    /// the teacher's capability-lookup-before-dispatch pattern.
    pub async fn dispatch(&self, cmd: ControlCommand) -> anyhow::Result<()> {
        for source in &self.sources {
            let caps = source.capabilities();
            let capable = match &cmd {
                ControlCommand::Play
                | ControlCommand::Pause
                | ControlCommand::TogglePlay => caps.play_pause,
                ControlCommand::SkipNext | ControlCommand::SkipPrev => caps.next_prev,
                ControlCommand::Seek(_) | ControlCommand::SeekBy(_) => caps.seek,
                ControlCommand::SetVolume(_)
                | ControlCommand::IncreaseVolume
                | ControlCommand::DecreaseVolume
                | ControlCommand::SetMute(_)
                | ControlCommand::ToggleMute => caps.volume,
                ControlCommand::SetShuffle(_)
                | ControlCommand::ToggleShuffle
                | ControlCommand::SetRepeat(_)
                | ControlCommand::ToggleRepeat => caps.shuffle_repeat,
                ControlCommand::SetHeart(_) | ControlCommand::ToggleHeart => caps.like,
                ControlCommand::AddToQueue(_)
                | ControlCommand::ClearQueue
                | ControlCommand::GetQueue
                | ControlCommand::PlayUri(_) => caps.queue,
            };
            if capable {
                return source.control(cmd).await;
            }
        }
        anyhow::bail!("no source capable of handling this command")
    }
}
