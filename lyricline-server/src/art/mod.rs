//! C5 — Art & Image Resolver.
//!
//! Two parallel pipelines (album art, artist images) over N providers.
//! Content-addressed storage grounded on `ArtifactEntry.content_hash` and
//! `CodedNil-cantus::spotify::ensure_image_cached` (download-once, keyed by
//! URL/hash via one shared `reqwest::Client`).

pub mod providers;

use crate::settings::SettingsStore;
use lyricline_common::hash::content_hash;
use lyricline_common::{ArtifactEntry, ProviderId, Result, TrackKey};
use providers::{ArtCandidate, ArtProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct ArtResolver {
    providers: Vec<Arc<dyn ArtProvider>>,
    http: reqwest::Client,
    art_dir: PathBuf,
    artists_dir: PathBuf,
    settings: Arc<SettingsStore>,
    /// `(TrackKey, provider_id, candidate_index) -> ArtifactEntry`, persisted
    /// as `cache.meta`.
    index: RwLock<std::collections::HashMap<String, ArtifactEntry>>,
    index_path: PathBuf,
}

fn index_key(track_key: &TrackKey, provider_id: &ProviderId, candidate_index: usize) -> String {
    format!("{}:{}:{}", track_key.as_str(), provider_id.as_str(), candidate_index)
}

fn provider_prefix(track_key: &TrackKey, provider_id: &ProviderId) -> String {
    format!("{}:{}:", track_key.as_str(), provider_id.as_str())
}

impl ArtResolver {
    pub fn new(
        providers: Vec<Arc<dyn ArtProvider>>,
        art_dir: PathBuf,
        artists_dir: PathBuf,
        index_path: PathBuf,
        settings: Arc<SettingsStore>,
    ) -> Result<Self> {
        let index = lyricline_common::durable::read_json_or_quarantine(&index_path)?
            .unwrap_or_default();
        Ok(Self {
            providers,
            http: reqwest::Client::new(),
            art_dir,
            artists_dir,
            settings,
            index: RwLock::new(index),
            index_path,
        })
    }

    async fn persist_index(&self) -> Result<()> {
        let snapshot = self.index.read().await.clone();
        lyricline_common::durable::write_json_atomic(&self.index_path, &snapshot)
    }

    /// Downloads and caches every provider's candidates for `track_key`,
    /// then returns the URL the client should be served per the preference
    /// rule: explicit preference > largest resolution (ties by provider
    /// priority).
    pub async fn resolve_album_art(&self, track_key: &TrackKey) -> Result<Option<String>> {
        for provider in &self.providers {
            let candidates = match provider.search_album_art(track_key).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(provider = %provider.id(), error = %e, "art provider search failed");
                    continue;
                }
            };
            for (candidate_index, candidate) in candidates.into_iter().enumerate() {
                if let Err(e) = self
                    .download_and_index(track_key, None, provider.id(), candidate_index, candidate)
                    .await
                {
                    tracing::warn!(provider = %provider.id(), error = %e, "art download failed");
                }
            }
        }

        let prefs = self.settings.preferences_for(track_key).await;
        let index = self.index.read().await;

        if let Some(preferred) = &prefs.preferred_art_provider {
            let prefix = provider_prefix(track_key, preferred);
            let best_for_provider = index
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .max_by_key(|(_, entry)| entry.resolution_px.unwrap_or(0));
            if let Some((_, entry)) = best_for_provider {
                return Ok(Some(self.served_url(entry)));
            }
        }

        let best = index
            .iter()
            .filter(|(k, _)| k.starts_with(&format!("{}:", track_key.as_str())))
            .max_by_key(|(_, entry)| entry.resolution_px.unwrap_or(0));

        Ok(best.map(|(_, entry)| self.served_url(entry)))
    }

    fn served_url(&self, entry: &ArtifactEntry) -> String {
        format!("/cover-art/{}", entry.content_hash)
    }

    async fn download_and_index(
        &self,
        track_key: &TrackKey,
        artist_key: Option<&str>,
        provider_id: ProviderId,
        candidate_index: usize,
        candidate: ArtCandidate,
    ) -> Result<()> {
        let key = index_key(track_key, &provider_id, candidate_index);
        if self.index.read().await.contains_key(&key) {
            return Ok(()); // this exact candidate slot was already downloaded
        }

        let bytes = self
            .http
            .get(&candidate.image_url)
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| lyricline_common::AppError::Http(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| lyricline_common::AppError::Http(e.to_string()))?;

        let hash = content_hash(&bytes);
        let extension = if candidate.image_url.ends_with(".png") { "png" } else { "jpg" };
        let stored_path = self.art_dir.join(format!("{hash}.{extension}"));
        lyricline_common::durable::write_atomic(&stored_path, &bytes)?;

        let entry = ArtifactEntry {
            track_key: Some(track_key.clone()),
            artist_key: artist_key.map(|s| s.to_string()),
            provider_id,
            resolution_px: candidate.resolution_px,
            content_hash: hash,
            stored_path: stored_path.display().to_string(),
            fetched_at: chrono::Utc::now(),
        };
        self.index.write().await.insert(key, entry);
        self.persist_index().await?;
        Ok(())
    }

    /// Artist images are cached per `artist_key` and served as a list for
    /// slideshow use; automatic choices do not persist to preferences.
    pub async fn resolve_artist_images(&self, artist_key: &str) -> Result<Vec<String>> {
        for provider in &self.providers {
            let candidates = match provider.search_artist_images(artist_key).await {
                Ok(candidates) => candidates,
                Err(_) => continue,
            };
            for (candidate_index, candidate) in candidates.into_iter().enumerate() {
                let dummy_track = TrackKey::normalize(artist_key, "__artist__");
                let _ = self
                    .download_and_index(
                        &dummy_track,
                        Some(artist_key),
                        provider.id(),
                        candidate_index,
                        candidate,
                    )
                    .await;
            }
        }
        let index = self.index.read().await;
        Ok(index
            .values()
            .filter(|e| e.artist_key.as_deref() == Some(artist_key))
            .map(|e| self.served_url(e))
            .collect())
    }

    pub fn artists_dir(&self) -> &PathBuf {
        &self.artists_dir
    }

    /// Candidates with `is_preferred`/`resolution` for the manual-selection
    /// UI.
    pub async fn list_options(&self, track_key: &TrackKey) -> Vec<ArtOptionInfo> {
        let prefs = self.settings.preferences_for(track_key).await;
        let prefix = format!("{}:", track_key.as_str());
        self.index
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, entry)| ArtOptionInfo {
                provider: entry.provider_id.to_string(),
                is_preferred: prefs.preferred_art_provider.as_ref() == Some(&entry.provider_id),
                resolution: entry.resolution_px,
            })
            .collect()
    }

    /// Reads artifact bytes by content hash, for the `/cover-art/:hash` and
    /// `/artist-images/...` routes.
    pub async fn serve_content(&self, hash: &str) -> Result<Vec<u8>> {
        for ext in ["jpg", "png"] {
            let path = self.art_dir.join(format!("{hash}.{ext}"));
            if path.exists() {
                return Ok(std::fs::read(path)?);
            }
        }
        Err(lyricline_common::AppError::NotFound(format!("no artifact for hash {hash}")))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ArtOptionInfo {
    pub provider: String,
    pub is_preferred: bool,
    pub resolution: Option<u32>,
}
