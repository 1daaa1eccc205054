//! C2 — Playback Fuser.
//!
//! Single-threaded cooperative selector: all fusion decisions land in one
//! place so selection and broadcast stay serialized. Grounded on the
//! teacher's `SharedState` (one `RwLock` + `broadcast::Sender`),
//! generalized to own the only mutable `NowPlaying`.

use crate::sources::SourceConfig;
use lyricline_common::{NowPlaying, PlaybackSnapshot, SourceId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Fires once per `TrackKey` change so per-track work (lyrics, art) can be
/// cancelled and restarted.
#[derive(Debug, Clone)]
pub struct TrackChanged {
    pub now_playing: NowPlaying,
}

struct Candidate {
    snapshot: PlaybackSnapshot,
    received_at: Instant,
}

pub struct Fuser {
    rx: mpsc::Receiver<PlaybackSnapshot>,
    tick: tokio::time::Interval,
    configs: HashMap<SourceId, SourceConfig>,
    candidates: HashMap<SourceId, Candidate>,
    last_published: NowPlaying,
    last_published_at: Instant,
    published_once: bool,
    published_tx: broadcast::Sender<NowPlaying>,
    track_changed_tx: broadcast::Sender<TrackChanged>,
}

impl Fuser {
    pub fn new(
        rx: mpsc::Receiver<PlaybackSnapshot>,
        configs: HashMap<SourceId, SourceConfig>,
    ) -> (Self, broadcast::Receiver<NowPlaying>, broadcast::Receiver<TrackChanged>) {
        let (published_tx, published_rx) = broadcast::channel(32);
        let (track_changed_tx, track_changed_rx) = broadcast::channel(32);
        let fuser = Self {
            rx,
            tick: tokio::time::interval(Duration::from_millis(250)),
            configs,
            candidates: HashMap::new(),
            last_published: NowPlaying::idle(),
            last_published_at: Instant::now(),
            published_once: false,
            published_tx,
            track_changed_tx,
        };
        (fuser, published_rx, track_changed_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NowPlaying> {
        self.published_tx.subscribe()
    }

    pub fn subscribe_track_changes(&self) -> broadcast::Receiver<TrackChanged> {
        self.track_changed_tx.subscribe()
    }

    /// Runs the selection loop until the snapshot channel closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_snapshot = self.rx.recv() => {
                    match maybe_snapshot {
                        Some(snapshot) => self.ingest(snapshot),
                        None => break,
                    }
                }
                _ = self.tick.tick() => {}
            }
            self.reevaluate();
        }
    }

    fn ingest(&mut self, snapshot: PlaybackSnapshot) {
        self.candidates.insert(
            snapshot.source_id.clone(),
            Candidate { snapshot, received_at: Instant::now() },
        );
    }

    fn paused_timeout_for(&self, source_id: &SourceId) -> Duration {
        self.configs
            .get(source_id)
            .map(|c| c.paused_timeout)
            .unwrap_or(Duration::from_secs(10))
    }

    fn priority_for(&self, source_id: &SourceId) -> u8 {
        self.configs.get(source_id).map(|c| c.priority).unwrap_or(0)
    }

    /// Re-runs the selection algorithm and republishes if the computed
    /// `NowPlaying` differs from the last one, or unconditionally every 1s
    /// so late subscribers converge.
    fn reevaluate(&mut self) {
        let now = Instant::now();

        self.candidates.retain(|source_id, candidate| {
            let timeout = self.paused_timeout_for(source_id);
            timeout == Duration::ZERO || candidate.received_at.elapsed() <= timeout
        });

        let winner_id = self.pick_winner();

        let computed = match winner_id {
            None => NowPlaying::idle(),
            Some(id) => self.build_now_playing(&id),
        };

        let should_publish = !self.published_once
            || self.differs_materially(&computed)
            || now.duration_since(self.last_published_at) >= Duration::from_secs(1);

        if should_publish {
            let track_changed = self.last_published.track_key != computed.track_key;
            self.last_published = computed.clone();
            self.last_published_at = now;
            self.published_once = true;
            let _ = self.published_tx.send(computed.clone());
            if track_changed {
                let _ = self.track_changed_tx.send(TrackChanged { now_playing: computed });
            }
        }
    }

    fn pick_winner(&self) -> Option<SourceId> {
        let playing: Vec<&SourceId> = self
            .candidates
            .iter()
            .filter(|(_, c)| c.snapshot.is_playing)
            .map(|(id, _)| id)
            .collect();

        let pool: Vec<&SourceId> = if !playing.is_empty() {
            playing
        } else {
            self.candidates.keys().collect()
        };

        pool.into_iter()
            .max_by(|a, b| {
                let pa = self.priority_for(a);
                let pb = self.priority_for(b);
                pa.cmp(&pb).then_with(|| {
                    let ta = self.candidates[*a].snapshot.sampled_at_ms;
                    let tb = self.candidates[*b].snapshot.sampled_at_ms;
                    ta.cmp(&tb)
                })
            })
            .cloned()
    }

    /// Hybrid enrichment: merge richer fields from a non-winning candidate
    /// sharing the winner's `track_key`, without touching position/playing.
    fn build_now_playing(&self, winner_id: &SourceId) -> NowPlaying {
        let winner = &self.candidates[winner_id].snapshot;
        let mut album = winner.album.clone();
        let mut album_art_uri = winner.album_art_uri.clone();
        let mut duration_ms = winner.duration_ms;

        for (id, candidate) in &self.candidates {
            if id == winner_id {
                continue;
            }
            if candidate.snapshot.track_key != winner.track_key {
                continue;
            }
            album = album.or_else(|| candidate.snapshot.album.clone());
            album_art_uri = album_art_uri.or_else(|| candidate.snapshot.album_art_uri.clone());
            duration_ms = duration_ms.or(candidate.snapshot.duration_ms);
        }

        NowPlaying {
            source_id: winner.source_id.clone(),
            track_key: Some(winner.track_key.clone()),
            title: winner.title.clone(),
            artist: winner.artist.clone(),
            artists: winner.artists.clone(),
            album,
            album_art_uri,
            album_art_url: None,
            artist_image_urls: Vec::new(),
            background_style: Default::default(),
            duration_ms,
            position_ms: winner.position_ms,
            is_playing: winner.is_playing,
            liked: winner.liked,
            shuffle: winner.shuffle,
            repeat: winner.repeat,
            volume: winner.volume,
            is_instrumental: None,
            has_lyrics: None,
            provider: None,
        }
    }

    fn differs_materially(&self, computed: &NowPlaying) -> bool {
        if self.last_published.track_key != computed.track_key {
            return true;
        }
        if self.last_published.is_playing != computed.is_playing {
            return true;
        }
        if self.last_published.liked != computed.liked {
            return true;
        }
        if self.last_published.album != computed.album {
            return true;
        }
        if self.last_published.shuffle != computed.shuffle {
            return true;
        }
        if self.last_published.repeat != computed.repeat {
            return true;
        }
        match (self.last_published.position_ms, computed.position_ms) {
            (Some(a), Some(b)) => a.abs_diff(b) > 500,
            (None, None) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricline_common::TrackKey;
    use std::collections::HashMap as Map;

    fn snapshot(source: &str, playing: bool, priority_key: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            source_id: SourceId::new(source),
            sampled_at_ms: 1000,
            track_key: TrackKey::normalize("artist", priority_key),
            title: priority_key.to_string(),
            artist: "artist".to_string(),
            artists: vec!["artist".to_string()],
            album: None,
            album_art_uri: None,
            duration_ms: Some(200_000),
            position_ms: Some(1_000),
            is_playing: playing,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            provenance: Map::new(),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn playing_source_wins_over_paused_higher_priority() {
        let (tx, rx) = mpsc::channel(16);
        let mut configs = HashMap::new();
        configs.insert(
            SourceId::new("service_api"),
            SourceConfig { priority: 10, poll_period: Duration::from_secs(1), paused_timeout: Duration::ZERO },
        );
        configs.insert(
            SourceId::new("os_media"),
            SourceConfig { priority: 5, poll_period: Duration::from_secs(1), paused_timeout: Duration::from_secs(10) },
        );
        let (mut fuser, mut published, _) = Fuser::new(rx, configs);

        tx.send(snapshot("service_api", false, "track-x")).await.unwrap();
        tx.send(snapshot("os_media", true, "track-y")).await.unwrap();

        fuser.ingest_for_test();
        fuser.reevaluate();
        let np = published.try_recv().unwrap();
        assert_eq!(np.title, "track-y");
    }

    impl Fuser {
        fn ingest_for_test(&mut self) {
            while let Ok(s) = self.rx.try_recv() {
                self.ingest(s);
            }
        }
    }

    #[tokio::test]
    async fn idle_published_when_no_candidates() {
        let (_tx, rx) = mpsc::channel(16);
        let (mut fuser, mut published, _) = Fuser::new(rx, HashMap::new());
        fuser.reevaluate();
        let np = published.try_recv().unwrap();
        assert!(np.is_idle());
    }
}
