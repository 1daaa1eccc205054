//! # lyricline-common
//!
//! Shared types with no I/O: the data model, the `TrackKey`/`SourceId`/
//! `ProviderId` newtypes, the error taxonomy, content hashing, and the
//! write-temp-then-rename durability helper used by the settings store and
//! the on-disk cache layer.

pub mod durable;
pub mod error;
pub mod hash;
pub mod ids;
pub mod model;

pub use error::{AppError, ErrorKind, Result};
pub use ids::{ProviderId, SourceId, TrackKey};
pub use model::{
    ArtifactEntry, BackgroundStyle, LyricsDoc, NowPlaying, PlaybackSnapshot, Settings,
    SyncedLine, SyncedWord, TrackPreferences, WordSyncedLine,
};
