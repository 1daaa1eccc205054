//! C4 — Lyrics Resolver.
//!
//! Races a fixed, ordered provider list for a `TrackKey`, applies user
//! preference, persists the result via C3. Grounded on the `Provider` enum
//! shape from `BEST8OY-LyricsMPRIS-Rust` (Lrclib/Musixmatch variants) and
//! the LRCLIB integration constants in `techno-hippies-dotheaven`.

pub mod providers;

use crate::cache::Cache;
use crate::settings::SettingsStore;
use lyricline_common::{AppError, LyricsDoc, ProviderId, Result, TrackKey};
use providers::LyricsProvider;
use std::sync::Arc;
use std::time::Duration;

/// Deadline for the provider race, per §5's "every outbound HTTP call has a
/// hard deadline (default 8s for lyrics)".
const RESOLUTION_DEADLINE: Duration = Duration::from_secs(8);
const NOT_FOUND_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct LyricsResolverQuery {
    pub track_key: TrackKey,
    pub duration_ms: Option<u64>,
    pub hint_service_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedLyrics {
    pub doc: LyricsDoc,
    pub provider_id: Option<ProviderId>,
    pub alternates: Vec<ProviderId>,
}

pub struct LyricsResolver {
    providers: Vec<Arc<dyn LyricsProvider>>,
    cache: Cache<String, LyricsDoc>,
    settings: Arc<SettingsStore>,
}

fn cache_key(track_key: &TrackKey, provider: &ProviderId) -> String {
    format!("{}:{}", track_key.as_str(), provider.as_str())
}

impl LyricsResolver {
    pub fn new(
        providers: Vec<Arc<dyn LyricsProvider>>,
        cache: Cache<String, LyricsDoc>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self { providers, cache, settings }
    }

    pub fn providers(&self) -> &[Arc<dyn LyricsProvider>] {
        &self.providers
    }

    /// Drops in-flight single-flight slots for `track_key` so a subsequent
    /// resolve for a *different* track never observes a stale in-flight
    /// result. Per §4.2's track-change semantics, this must run within
    /// 100ms of the fuser publishing the new track.
    pub fn cancel_in_flight(&self, track_key: &TrackKey) {
        for provider in &self.providers {
            self.cache.invalidate(&cache_key(track_key, &provider.id()));
        }
    }

    pub async fn is_cached(&self, track_key: &TrackKey, provider_id: &ProviderId) -> bool {
        let key = cache_key(track_key, provider_id);
        self.cache
            .get(&key)
            .await
            .map(|doc| !doc.is_not_found())
            .unwrap_or(false)
    }

    pub async fn resolve(&self, query: LyricsResolverQuery) -> Result<ResolvedLyrics> {
        let prefs = self.settings.preferences_for(&query.track_key).await;

        if let Some(preferred) = &prefs.preferred_lyrics_provider {
            let key = cache_key(&query.track_key, preferred);
            if let Some(doc) = self.cache.get(&key).await {
                if !doc.is_not_found() {
                    return Ok(ResolvedLyrics {
                        doc,
                        provider_id: Some(preferred.clone()),
                        alternates: self.cached_alternates(&query.track_key, preferred).await,
                    });
                }
            }
        }

        // Step 1: any already-cached non-error entry short-circuits the race.
        for provider in &self.providers {
            let key = cache_key(&query.track_key, &provider.id());
            if let Some(doc) = self.cache.get(&key).await {
                if !doc.is_not_found() {
                    let alternates = self.cached_alternates(&query.track_key, &provider.id()).await;
                    return Ok(ResolvedLyrics { doc, provider_id: Some(provider.id()), alternates });
                }
            }
        }

        self.race(query).await
    }

    async fn cached_alternates(&self, track_key: &TrackKey, exclude: &ProviderId) -> Vec<ProviderId> {
        let mut alternates = Vec::new();
        for provider in &self.providers {
            if &provider.id() == exclude {
                continue;
            }
            let key = cache_key(track_key, &provider.id());
            if let Some(doc) = self.cache.get(&key).await {
                if !doc.is_not_found() {
                    alternates.push(provider.id());
                    if alternates.len() >= 2 {
                        break;
                    }
                }
            }
        }
        alternates
    }

    async fn race(&self, query: LyricsResolverQuery) -> Result<ResolvedLyrics> {
        let track_key = query.track_key.clone();
        let duration_ms = query.duration_ms;
        let hint = query.hint_service_id.clone();

        let mut handles = Vec::new();
        for provider in self.providers.clone() {
            let track_key = track_key.clone();
            let hint = hint.clone();
            handles.push(tokio::spawn(async move {
                let result = provider.fetch(&track_key, hint.as_deref()).await;
                (provider.id(), provider.priority(), result)
            }));
        }

        let deadline = tokio::time::sleep(RESOLUTION_DEADLINE);
        tokio::pin!(deadline);

        let mut best: Option<(ProviderId, u8, LyricsDoc)> = None;
        let mut any_success = false;
        let mut pending = handles;

        loop {
            if pending.is_empty() {
                break;
            }
            tokio::select! {
                _ = &mut deadline => break,
                (finished, _index, remaining) = futures::future::select_all(pending) => {
                    pending = remaining;
                    if let Ok((provider_id, priority, Ok(doc))) = finished {
                        any_success = true;
                        let doc = doc.demote_if_overrun(duration_ms);
                        let key = cache_key(&track_key, &provider_id);
                        let ttl = if doc.is_not_found() { Some(NOT_FOUND_TTL) } else { None };
                        let _ = self.cache.get_or_fetch(key, ttl, {
                            let doc = doc.clone();
                            move || async move { Ok(doc) }
                        }).await;

                        if !doc.is_not_found() {
                            let better = match &best {
                                None => true,
                                Some((_, best_priority, best_doc)) => {
                                    doc.tier() > best_doc.tier()
                                        || (doc.tier() == best_doc.tier() && priority > *best_priority)
                                }
                            };
                            if better {
                                best = Some((provider_id, priority, doc));
                            }
                        }
                    }
                }
            }
        }

        if let Some((provider_id, _, doc)) = best {
            let alternates = self.cached_alternates(&track_key, &provider_id).await;
            return Ok(ResolvedLyrics { doc, provider_id: Some(provider_id), alternates });
        }

        if !any_success {
            tracing::warn!(track_key = %track_key, "all lyrics providers failed or timed out");
        }

        let not_found = LyricsDoc::NotFound { fetched_at: chrono::Utc::now() };
        for provider in &self.providers {
            let key = cache_key(&track_key, &provider.id());
            let _ = self
                .cache
                .get_or_fetch(key, Some(NOT_FOUND_TTL), {
                    let doc = not_found.clone();
                    move || async move { Ok::<LyricsDoc, AppError>(doc) }
                })
                .await;
        }

        Ok(ResolvedLyrics { doc: not_found, provider_id: None, alternates: Vec::new() })
    }
}
