//! C6 — Spicetify Bridge Hub.
//!
//! Accepts inbound WebSocket connections from zero or more browser
//! extensions on a well-known path, authenticated only by locality (binds
//! to loopback by default). Grounded on the teacher's SSE broadcaster
//! (`wkmp_ap::sse::broadcaster`), generalized from fan-out-only to a
//! bidirectional per-connection registry.

pub mod messages;
pub mod source;

use self::messages::{ControlAck, ControlEnvelope, FromExtension, ToExtension};
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use lyricline_common::{PlaybackSnapshot, SourceId, TrackKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, RwLock};

/// How long to wait for an extension's `control_ack` before treating the
/// dispatched command as failed.
const CONTROL_ACK_TIMEOUT: Duration = Duration::from_secs(5);

pub type ConnId = u64;

/// The extension's last reported position, extrapolated by wall-clock since
/// `position_as_of_timestamp`.
#[derive(Debug, Clone)]
pub struct ExtrapolatedState {
    pub title: String,
    pub artist: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub position_as_of_ms: u64,
    pub position_at_report_ms: u64,
    pub is_playing: bool,
}

impl ExtrapolatedState {
    pub fn extrapolated_position_ms(&self, now_ms: u64) -> u64 {
        if !self.is_playing {
            return self.position_at_report_ms;
        }
        let elapsed = now_ms.saturating_sub(self.position_as_of_ms);
        let position = self.position_at_report_ms + elapsed;
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

struct Connection {
    sender: mpsc::Sender<ToExtension>,
    last_state: Arc<RwLock<Option<ExtrapolatedState>>>,
}

/// Per-connection send is serialized via each connection's own mpsc sender,
/// matching the shared-resource policy for the bridge hub connection map.
pub struct BridgeHub {
    connections: DashMap<ConnId, Connection>,
    next_id: AtomicU64,
    pending_acks: DashMap<u64, oneshot::Sender<ControlAck>>,
    next_request_id: AtomicU64,
}

impl Default for BridgeHub {
    fn default() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            pending_acks: DashMap::new(),
            next_request_id: AtomicU64::new(1),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl BridgeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the freshest connection's extrapolated snapshot, if its last
    /// report is still within `paused_timeout`.
    pub async fn latest_snapshot(&self, paused_timeout: Duration) -> Option<PlaybackSnapshot> {
        let now = now_ms();
        let mut best: Option<(u64, ExtrapolatedState)> = None;
        for entry in self.connections.iter() {
            let state = entry.last_state.read().await.clone();
            if let Some(state) = state {
                if now.saturating_sub(state.position_as_of_ms) <= paused_timeout.as_millis() as u64 {
                    let candidate_recency = state.position_as_of_ms;
                    if best.as_ref().map(|(t, _)| candidate_recency > *t).unwrap_or(true) {
                        best = Some((candidate_recency, state));
                    }
                }
            }
        }
        let (_, state) = best?;
        let position_ms = state.extrapolated_position_ms(now);
        Some(PlaybackSnapshot {
            source_id: SourceId::new("bridge"),
            sampled_at_ms: now,
            track_key: TrackKey::normalize(&state.artist, &state.title),
            title: state.title,
            artist: state.artist.clone(),
            artists: if state.artists.is_empty() {
                vec![state.artist]
            } else {
                state.artists
            },
            album: state.album,
            album_art_uri: state.album_art_uri,
            duration_ms: state.duration_ms,
            position_ms: Some(position_ms),
            is_playing: state.is_playing,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            provenance: HashMap::new(),
            extra: HashMap::new(),
        })
    }

    /// Dispatches `cmd` to every connected extension and waits for the first
    /// `control_ack` correlated by request id, per the bridge's command/ack
    /// contract. Times out rather than hanging forever if no ack arrives.
    pub async fn broadcast_control(&self, cmd: ControlEnvelope) -> ControlAck {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending_acks.insert(request_id, tx);

        let mut dispatched = false;
        for entry in self.connections.iter() {
            let msg = ToExtension::Control { request_id, command: cmd.clone() };
            if entry.sender.send(msg).await.is_ok() {
                dispatched = true;
            }
        }

        if !dispatched {
            self.pending_acks.remove(&request_id);
            return ControlAck {
                request_id,
                success: false,
                error: Some("no connected extension".to_string()),
            };
        }

        match tokio::time::timeout(CONTROL_ACK_TIMEOUT, rx).await {
            Ok(Ok(ack)) => ack,
            _ => {
                self.pending_acks.remove(&request_id);
                ControlAck {
                    request_id,
                    success: false,
                    error: Some("timed out waiting for control_ack".to_string()),
                }
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drives one accepted WebSocket connection until it closes.
    pub async fn handle_connection(self: Arc<Self>, socket: WebSocket) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::channel::<ToExtension>(64);
        let last_state = Arc::new(RwLock::new(None));

        self.connections.insert(
            id,
            Connection {
                sender: tx.clone(),
                last_state: last_state.clone(),
            },
        );

        let heartbeat_tx = tx.clone();
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(20));
            loop {
                ticker.tick().await;
                if heartbeat_tx.send(ToExtension::Ping).await.is_err() {
                    break;
                }
            }
        });

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Ok(text) = serde_json::to_string(&msg) else { continue };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<FromExtension>(&text) {
                Ok(FromExtension::Position(p)) => {
                    let mut guard = last_state.write().await;
                    let existing = guard.clone();
                    *guard = Some(ExtrapolatedState {
                        title: existing.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
                        artist: existing.as_ref().map(|s| s.artist.clone()).unwrap_or_default(),
                        artists: existing.map(|s| s.artists).unwrap_or_default(),
                        album: None,
                        album_art_uri: None,
                        duration_ms: None,
                        position_as_of_ms: now_ms(),
                        position_at_report_ms: p.position_ms,
                        is_playing: p.is_playing,
                    });
                }
                Ok(FromExtension::TrackData(t)) => {
                    let mut guard = last_state.write().await;
                    *guard = Some(ExtrapolatedState {
                        title: t.title,
                        artist: t.artist.clone(),
                        artists: t.artists,
                        album: t.album,
                        album_art_uri: t.album_art_uri,
                        duration_ms: t.duration_ms,
                        position_as_of_ms: now_ms(),
                        position_at_report_ms: t.position_ms.unwrap_or(0),
                        is_playing: t.is_playing,
                    });
                }
                Ok(FromExtension::Pong) => {}
                Ok(FromExtension::ControlAck(ack)) => {
                    if let Some((_, tx)) = self.pending_acks.remove(&ack.request_id) {
                        let _ = tx.send(ack);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unknown bridge message kind");
                }
            }
        }

        self.connections.remove(&id);
        heartbeat.abort();
        writer.abort();
    }
}

use futures::{SinkExt, StreamExt};
