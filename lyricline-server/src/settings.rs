//! C8 — Settings Store.
//!
//! A single persistent document keyed by dotted paths (global settings plus
//! per-track preferences), loaded on start. All mutations go through a
//! single writer task; reads are copy-on-read so they never hold the writer
//! lock during serialization. Grounded on the teacher's `SharedState`
//! (`RwLock<...>` + `broadcast::Sender` for change notification), adapted
//! from SQLite-backed rows to one JSON document per §4.8's deviation.

use lyricline_common::durable::{read_json_or_quarantine, write_json_atomic};
use lyricline_common::{Result, Settings, TrackKey, TrackPreferences};
use std::path::PathBuf;
use tokio::sync::{broadcast, RwLock};

/// Published whenever settings or a track's preferences change, so C2/C4/C5
/// can re-evaluate.
#[derive(Debug, Clone)]
pub enum SettingsChanged {
    Global,
    Track(TrackKey),
}

pub struct SettingsStore {
    path: PathBuf,
    inner: RwLock<Settings>,
    changes: broadcast::Sender<SettingsChanged>,
}

impl SettingsStore {
    pub fn load(path: PathBuf) -> Result<Self> {
        let settings = read_json_or_quarantine::<Settings>(&path)?.unwrap_or_default();
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            path,
            inner: RwLock::new(settings),
            changes,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.changes.subscribe()
    }

    /// Copy-on-read snapshot of the whole document.
    pub async fn snapshot(&self) -> Settings {
        self.inner.read().await.clone()
    }

    pub async fn preferences_for(&self, key: &TrackKey) -> TrackPreferences {
        self.inner
            .read()
            .await
            .track_preferences
            .get(key.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Applies `mutator` under the single writer lock, persists durably,
    /// then publishes a change notification.
    async fn mutate(&self, notify: SettingsChanged, mutator: impl FnOnce(&mut Settings)) -> Result<()> {
        let snapshot = {
            let mut guard = self.inner.write().await;
            mutator(&mut guard);
            guard.clone()
        };
        write_json_atomic(&self.path, &snapshot)?;
        let _ = self.changes.send(notify);
        Ok(())
    }

    pub async fn set_track_preference(
        &self,
        key: TrackKey,
        mutator: impl FnOnce(&mut TrackPreferences),
    ) -> Result<()> {
        let notify = SettingsChanged::Track(key.clone());
        self.mutate(notify, move |settings| {
            let prefs = settings
                .track_preferences
                .entry(key.as_str().to_string())
                .or_default();
            mutator(prefs);
        })
        .await
    }

    pub async fn update_global(&self, mutator: impl FnOnce(&mut Settings)) -> Result<()> {
        self.mutate(SettingsChanged::Global, mutator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricline_common::ProviderId;

    #[tokio::test]
    async fn preference_write_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(path.clone()).unwrap();
        let key = TrackKey::normalize("Artist", "Title");

        for _ in 0..2 {
            store
                .set_track_preference(key.clone(), |p| {
                    p.preferred_art_provider = Some(ProviderId::new("fanart"));
                })
                .await
                .unwrap();
        }

        let on_disk = std::fs::read_to_string(&path).unwrap();
        let reloaded: Settings = serde_json::from_str(&on_disk).unwrap();
        let prefs = reloaded.track_preferences.get(key.as_str()).unwrap();
        assert_eq!(prefs.preferred_art_provider, Some(ProviderId::new("fanart")));
    }

    #[tokio::test]
    async fn defaults_used_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json")).unwrap();
        let snap = store.snapshot().await;
        assert_eq!(snap.update_interval_ms, 200);
    }
}
