//! Wire/data-model types shared by every component: [`PlaybackSnapshot`],
//! [`NowPlaying`], [`LyricsDoc`], [`ArtifactEntry`], [`TrackPreferences`],
//! [`Settings`].

use crate::ids::{ProviderId, SourceId, TrackKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStyle {
    Blur,
    Soft,
    Sharp,
    None,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        BackgroundStyle::Blur
    }
}

/// One sample emitted by a source. Created by C1, consumed by C2, never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub source_id: SourceId,
    /// Monotonic sample time, milliseconds since process start.
    pub sampled_at_ms: u64,
    pub track_key: TrackKey,
    pub title: String,
    pub artist: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
    pub is_playing: bool,
    pub liked: Option<bool>,
    pub shuffle: Option<bool>,
    pub repeat: Option<u8>,
    pub volume: Option<f32>,
    /// Source-native IDs (e.g. the streaming service's track id).
    pub provenance: HashMap<String, String>,
    /// Source-specific enrichment the fuser doesn't interpret itself.
    pub extra: HashMap<String, serde_json::Value>,
}

impl PlaybackSnapshot {
    /// Clamps position into `[0, duration_ms]` per the boundary-behavior
    /// rule; rejects snapshots with an empty title while `is_playing`.
    pub fn validate_and_clamp(mut self) -> Option<Self> {
        if self.is_playing && self.title.trim().is_empty() {
            return None;
        }
        if let Some(duration) = self.duration_ms {
            if let Some(position) = self.position_ms {
                self.position_ms = Some(position.min(duration));
            }
        }
        Some(self)
    }
}

/// The single fused state the server exposes. One global instance, updated
/// by C2 only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub source_id: SourceId,
    pub track_key: Option<TrackKey>,
    pub title: String,
    pub artist: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
    pub album_art_url: Option<String>,
    pub artist_image_urls: Vec<String>,
    pub background_style: BackgroundStyle,
    pub duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
    pub is_playing: bool,
    pub liked: Option<bool>,
    pub shuffle: Option<bool>,
    pub repeat: Option<u8>,
    pub volume: Option<f32>,
    pub is_instrumental: Option<bool>,
    pub has_lyrics: Option<bool>,
    pub provider: Option<ProviderId>,
}

impl NowPlaying {
    /// The `Idle` document: no candidate exists, all text fields empty,
    /// `source_id = none`.
    pub fn idle() -> Self {
        Self {
            source_id: SourceId::new("none"),
            track_key: None,
            title: String::new(),
            artist: String::new(),
            artists: Vec::new(),
            album: None,
            album_art_uri: None,
            album_art_url: None,
            artist_image_urls: Vec::new(),
            background_style: BackgroundStyle::default(),
            duration_ms: None,
            position_ms: None,
            is_playing: false,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            is_instrumental: None,
            has_lyrics: None,
            provider: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.track_key.is_none()
    }
}

/// One `{t_ms, text}` lyric line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedLine {
    pub t_ms: u64,
    pub text: String,
}

/// One `{t_ms, word}` item inside a word-synced line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedWord {
    pub t_ms: u64,
    pub word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordSyncedLine {
    pub words: Vec<SyncedWord>,
}

/// One track's lyrics, tiered `WordSynced > Synced > Unsynced > Instrumental`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LyricsDoc {
    WordSynced {
        lines: Vec<WordSyncedLine>,
        provider_id: ProviderId,
        fetched_at: DateTime<Utc>,
        source_url: Option<String>,
    },
    Synced {
        lines: Vec<SyncedLine>,
        provider_id: ProviderId,
        fetched_at: DateTime<Utc>,
        source_url: Option<String>,
    },
    Unsynced {
        lines: Vec<String>,
        provider_id: ProviderId,
        fetched_at: DateTime<Utc>,
        source_url: Option<String>,
    },
    Instrumental {
        provider_id: ProviderId,
        fetched_at: DateTime<Utc>,
    },
    NotFound {
        fetched_at: DateTime<Utc>,
    },
}

impl LyricsDoc {
    /// Relative tier used by the resolver's ranking rule: higher wins.
    pub fn tier(&self) -> u8 {
        match self {
            LyricsDoc::WordSynced { .. } => 3,
            LyricsDoc::Synced { .. } => 2,
            LyricsDoc::Unsynced { .. } => 1,
            LyricsDoc::Instrumental { .. } => 0,
            LyricsDoc::NotFound { .. } => 0,
        }
    }

    pub fn provider_id(&self) -> Option<&ProviderId> {
        match self {
            LyricsDoc::WordSynced { provider_id, .. }
            | LyricsDoc::Synced { provider_id, .. }
            | LyricsDoc::Unsynced { provider_id, .. }
            | LyricsDoc::Instrumental { provider_id, .. } => Some(provider_id),
            LyricsDoc::NotFound { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LyricsDoc::NotFound { .. })
    }

    /// A `Synced` document whose largest `t_ms` exceeds `duration_ms` by
    /// more than 5s is demoted to `Unsynced` per the boundary-behavior rule.
    pub fn demote_if_overrun(self, duration_ms: Option<u64>) -> Self {
        if let (LyricsDoc::Synced { lines, provider_id, fetched_at, source_url }, Some(duration)) =
            (&self, duration_ms)
        {
            if let Some(max_t) = lines.iter().map(|l| l.t_ms).max() {
                if max_t > duration + 5_000 {
                    return LyricsDoc::Unsynced {
                        lines: lines.iter().map(|l| l.text.clone()).collect(),
                        provider_id: provider_id.clone(),
                        fetched_at: *fetched_at,
                        source_url: source_url.clone(),
                    };
                }
            }
        }
        self
    }

    /// `Synced.t_ms` values must be strictly monotonic non-decreasing.
    pub fn is_monotonic(&self) -> bool {
        match self {
            LyricsDoc::Synced { lines, .. } => lines.windows(2).all(|w| w[0].t_ms <= w[1].t_ms),
            LyricsDoc::WordSynced { lines, .. } => lines.iter().all(|l| {
                l.words.windows(2).all(|w| w[0].t_ms <= w[1].t_ms)
            }),
            _ => true,
        }
    }
}

/// One cached external artifact (art or artist image).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub track_key: Option<TrackKey>,
    pub artist_key: Option<String>,
    pub provider_id: ProviderId,
    pub resolution_px: Option<u32>,
    pub content_hash: String,
    pub stored_path: String,
    pub fetched_at: DateTime<Utc>,
}

/// Per-track user choices, keyed by `TrackKey`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackPreferences {
    pub preferred_lyrics_provider: Option<ProviderId>,
    pub preferred_art_provider: Option<ProviderId>,
    #[serde(default)]
    pub background_style: BackgroundStyle,
    pub last_verified_at: Option<DateTime<Utc>>,
}

/// Process-wide scalar settings: update interval, blur strength,
/// visual-mode toggles, blocklists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub update_interval_ms: u64,
    pub blur_strength_px: u32,
    pub overlay_opacity: f32,
    #[serde(default)]
    pub source_blocklists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub track_preferences: HashMap<String, TrackPreferences>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval_ms: 200,
            blur_strength_px: 24,
            overlay_opacity: 0.85,
            source_blocklists: HashMap::new(),
            track_preferences: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lyrics_doc_round_trips_through_json_for_every_variant() {
        let docs = vec![
            LyricsDoc::WordSynced {
                lines: vec![WordSyncedLine { words: vec![] }],
                provider_id: ProviderId::new("lrclib"),
                fetched_at: Utc::now(),
                source_url: None,
            },
            LyricsDoc::Synced {
                lines: vec![SyncedLine { t_ms: 0, text: "la".into() }],
                provider_id: ProviderId::new("lrclib"),
                fetched_at: Utc::now(),
                source_url: Some("https://example.test".into()),
            },
            LyricsDoc::Unsynced {
                lines: vec!["la".into()],
                provider_id: ProviderId::new("lrclib"),
                fetched_at: Utc::now(),
                source_url: None,
            },
            LyricsDoc::Instrumental {
                provider_id: ProviderId::new("lrclib"),
                fetched_at: Utc::now(),
            },
            LyricsDoc::NotFound { fetched_at: Utc::now() },
        ];
        for doc in docs {
            let json = serde_json::to_string(&doc).unwrap();
            let back: LyricsDoc = serde_json::from_str(&json).unwrap();
            assert_eq!(doc.tier(), back.tier());
        }
    }

    #[test]
    fn overlong_synced_demotes_to_unsynced() {
        let doc = LyricsDoc::Synced {
            lines: vec![SyncedLine { t_ms: 250_000, text: "late".into() }],
            provider_id: ProviderId::new("p"),
            fetched_at: Utc::now(),
            source_url: None,
        };
        let demoted = doc.demote_if_overrun(Some(200_000));
        assert!(matches!(demoted, LyricsDoc::Unsynced { .. }));
    }

    #[test]
    fn snapshot_clamps_position_to_duration() {
        let snap = PlaybackSnapshot {
            source_id: SourceId::new("mpris"),
            sampled_at_ms: 0,
            track_key: TrackKey::normalize("a", "b"),
            title: "b".into(),
            artist: "a".into(),
            artists: vec!["a".into()],
            album: None,
            album_art_uri: None,
            duration_ms: Some(100),
            position_ms: Some(500),
            is_playing: true,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            provenance: HashMap::new(),
            extra: HashMap::new(),
        };
        let clamped = snap.validate_and_clamp().unwrap();
        assert_eq!(clamped.position_ms, Some(100));
    }

    #[test]
    fn empty_title_while_playing_is_rejected() {
        let snap = PlaybackSnapshot {
            source_id: SourceId::new("mpris"),
            sampled_at_ms: 0,
            track_key: TrackKey::normalize("a", ""),
            title: "   ".into(),
            artist: "a".into(),
            artists: vec![],
            album: None,
            album_art_uri: None,
            duration_ms: None,
            position_ms: None,
            is_playing: true,
            liked: None,
            shuffle: None,
            repeat: None,
            volume: None,
            provenance: HashMap::new(),
            extra: HashMap::new(),
        };
        assert!(snap.validate_and_clamp().is_none());
    }
}
