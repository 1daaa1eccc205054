//! Root "engine" struct holding every owned subsystem and the `AppContext`
//! threaded into every HTTP handler, per the design note against
//! process-wide module-state singletons. Grounded on the teacher's
//! `AppContext` (`wkmp_ap::api::server`).

use crate::art::ArtResolver;
use crate::bridge::BridgeHub;
use crate::lyrics::LyricsResolver;
use crate::sources::SourceRegistry;
use lyricline_common::NowPlaying;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct AppContext {
    pub sources: Arc<SourceRegistry>,
    pub now_playing: Arc<tokio::sync::RwLock<NowPlaying>>,
    pub now_playing_rx_factory: Arc<dyn Fn() -> broadcast::Receiver<NowPlaying> + Send + Sync>,
    pub lyrics: Arc<LyricsResolver>,
    pub art: Arc<ArtResolver>,
    pub settings: Arc<SettingsStore>,
    pub bridge: Arc<BridgeHub>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn subscribe_now_playing(&self) -> broadcast::Receiver<NowPlaying> {
        (self.now_playing_rx_factory)()
    }

    pub async fn current_now_playing(&self) -> NowPlaying {
        self.now_playing.read().await.clone()
    }
}
