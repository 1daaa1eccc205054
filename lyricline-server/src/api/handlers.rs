//! HTTP handlers for the endpoint table. GETs are read-only against the
//! broadcast `NowPlaying` snapshot plus C3; POSTs modify C8 and then nudge
//! C4/C5 if relevant.

use crate::error::{Result, ServerError};
use crate::sources::ControlCommand;
use crate::state::AppContext;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use lyricline_common::{BackgroundStyle, ProviderId, TrackKey};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn build_info() -> impl IntoResponse {
    Json(json!({
        "git_hash": env!("GIT_HASH"),
        "build_timestamp": env!("BUILD_TIMESTAMP"),
        "build_profile": env!("BUILD_PROFILE"),
    }))
}

pub async fn current_track(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.current_now_playing().await)
}

#[derive(Debug, Serialize)]
struct LyricsResponse {
    lyrics: lyricline_common::LyricsDoc,
    provider: Option<ProviderId>,
    is_instrumental: bool,
    has_lyrics: bool,
    colors: Option<serde_json::Value>,
}

pub async fn lyrics(State(ctx): State<AppContext>) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key.clone() else {
        return Ok(Json(LyricsResponse {
            lyrics: lyricline_common::LyricsDoc::Instrumental {
                provider_id: ProviderId::new("none"),
                fetched_at: chrono::Utc::now(),
            },
            provider: None,
            is_instrumental: true,
            has_lyrics: false,
            colors: None,
        }));
    };

    let resolved = ctx
        .lyrics
        .resolve(crate::lyrics::LyricsResolverQuery {
            track_key,
            duration_ms: now_playing.duration_ms,
            hint_service_id: None,
        })
        .await?;

    let is_instrumental = matches!(resolved.doc, lyricline_common::LyricsDoc::Instrumental { .. });
    let has_lyrics = !is_instrumental && !resolved.doc.is_not_found();

    Ok(Json(LyricsResponse {
        lyrics: resolved.doc,
        provider: resolved.provider_id,
        is_instrumental,
        has_lyrics,
        colors: None,
    }))
}

pub async fn config(State(ctx): State<AppContext>) -> impl IntoResponse {
    let settings = ctx.settings.snapshot().await;
    Json(json!({
        "update_interval_ms": settings.update_interval_ms,
        "blur_strength_px": settings.blur_strength_px,
        "overlay_opacity": settings.overlay_opacity,
    }))
}

#[derive(Debug, Serialize)]
struct ProviderAvailability {
    provider: String,
    is_current: bool,
    cached: bool,
}

pub async fn providers_available(State(ctx): State<AppContext>) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Ok(Json(Vec::<ProviderAvailability>::new()));
    };
    let current = now_playing.provider;
    let mut list = Vec::new();
    for provider in ctx.lyrics.providers() {
        let cached = ctx.lyrics.is_cached(&track_key, &provider.id()).await;
        list.push(ProviderAvailability {
            provider: provider.id().to_string(),
            is_current: current.as_ref() == Some(&provider.id()),
            cached,
        });
    }
    Ok(Json(list))
}

#[derive(Debug, Deserialize)]
pub struct ProviderPreferenceBody {
    pub provider: String,
}

pub async fn set_provider_preference(
    State(ctx): State<AppContext>,
    Json(body): Json<ProviderPreferenceBody>,
) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Err(ServerError::BadRequest("no track currently playing".into()));
    };
    let provider = ProviderId::new(body.provider);
    ctx.settings
        .set_track_preference(track_key.clone(), move |p| {
            p.preferred_lyrics_provider = Some(provider.clone());
        })
        .await?;
    respond_with_lyrics(&ctx, track_key).await
}

pub async fn clear_provider_preference(State(ctx): State<AppContext>) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Err(ServerError::BadRequest("no track currently playing".into()));
    };
    ctx.settings
        .set_track_preference(track_key.clone(), |p| {
            p.preferred_lyrics_provider = None;
        })
        .await?;
    respond_with_lyrics(&ctx, track_key).await
}

async fn respond_with_lyrics(ctx: &AppContext, track_key: TrackKey) -> Result<Json<LyricsResponse>> {
    let resolved = ctx
        .lyrics
        .resolve(crate::lyrics::LyricsResolverQuery {
            track_key,
            duration_ms: None,
            hint_service_id: None,
        })
        .await?;
    let is_instrumental = matches!(resolved.doc, lyricline_common::LyricsDoc::Instrumental { .. });
    let has_lyrics = !is_instrumental && !resolved.doc.is_not_found();
    Ok(Json(LyricsResponse {
        lyrics: resolved.doc,
        provider: resolved.provider_id,
        is_instrumental,
        has_lyrics,
        colors: None,
    }))
}

pub async fn album_art_options(State(ctx): State<AppContext>) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Ok(Json(Vec::<crate::art::ArtOptionInfo>::new()));
    };
    let options = ctx.art.list_options(&track_key).await;
    Ok(Json(options))
}

#[derive(Debug, Deserialize)]
pub struct AlbumArtPreferenceBody {
    pub provider: String,
}

pub async fn set_album_art_preference(
    State(ctx): State<AppContext>,
    Json(body): Json<AlbumArtPreferenceBody>,
) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Err(ServerError::BadRequest("no track currently playing".into()));
    };
    let provider = ProviderId::new(body.provider);
    ctx.settings
        .set_track_preference(track_key.clone(), move |p| {
            p.preferred_art_provider = Some(provider.clone());
        })
        .await?;
    let url = ctx.art.resolve_album_art(&track_key).await?;
    Ok(Json(json!({ "cache_bust": chrono::Utc::now().timestamp_millis(), "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct BackgroundStyleBody {
    pub style: String,
}

pub async fn set_background_style(
    State(ctx): State<AppContext>,
    Json(body): Json<BackgroundStyleBody>,
) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let Some(track_key) = now_playing.track_key else {
        return Err(ServerError::BadRequest("no track currently playing".into()));
    };
    let style = match body.style.as_str() {
        "blur" => BackgroundStyle::Blur,
        "soft" => BackgroundStyle::Soft,
        "sharp" => BackgroundStyle::Sharp,
        "none" => BackgroundStyle::None,
        other => return Err(ServerError::BadRequest(format!("unknown background style: {other}"))),
    };
    ctx.settings
        .set_track_preference(track_key, move |p| {
            p.background_style = style;
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn dispatch(ctx: &AppContext, cmd: ControlCommand) -> impl IntoResponse {
    match ctx.sources.dispatch(cmd).await {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn playback_play_pause(State(ctx): State<AppContext>) -> impl IntoResponse {
    dispatch(&ctx, ControlCommand::TogglePlay).await
}

pub async fn playback_next(State(ctx): State<AppContext>) -> impl IntoResponse {
    dispatch(&ctx, ControlCommand::SkipNext).await
}

pub async fn playback_previous(State(ctx): State<AppContext>) -> impl IntoResponse {
    dispatch(&ctx, ControlCommand::SkipPrev).await
}

pub async fn playback_queue(State(ctx): State<AppContext>) -> impl IntoResponse {
    match ctx.sources.dispatch(ControlCommand::GetQueue).await {
        Ok(()) => Json(json!({ "success": true, "queue": [] })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn playback_liked_get(State(ctx): State<AppContext>) -> impl IntoResponse {
    let now_playing = ctx.current_now_playing().await;
    Json(json!({ "liked": now_playing.liked }))
}

#[derive(Debug, Deserialize)]
pub struct LikedBody {
    pub track_id: Option<String>,
    pub action: String,
}

pub async fn playback_liked_post(
    State(ctx): State<AppContext>,
    Json(body): Json<LikedBody>,
) -> impl IntoResponse {
    let heart = body.action == "like";
    dispatch(&ctx, ControlCommand::SetHeart(heart)).await
}

#[derive(Debug, Deserialize)]
pub struct SlideshowQuery {
    pub limit: Option<usize>,
}

pub async fn slideshow_random_images(
    State(ctx): State<AppContext>,
    Query(query): Query<SlideshowQuery>,
) -> Result<impl IntoResponse> {
    let now_playing = ctx.current_now_playing().await;
    let limit = query.limit.unwrap_or(10);
    let mut images = ctx.art.resolve_artist_images(&now_playing.artist).await?;
    images.shuffle(&mut rand::thread_rng());
    Ok(Json(images.into_iter().take(limit).collect::<Vec<_>>()))
}

pub async fn cover_art(
    State(ctx): State<AppContext>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse> {
    let bytes = ctx.art.serve_content(&hash).await?;
    Ok(axum::body::Bytes::from(bytes))
}

pub async fn artist_image(
    State(ctx): State<AppContext>,
    Path((artist_key, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse> {
    let images = ctx.art.resolve_artist_images(&artist_key).await?;
    let url = images
        .get(index)
        .ok_or_else(|| ServerError::BadRequest("no such artist image index".into()))?;
    let hash = url.rsplit('/').next().unwrap_or_default().to_string();
    let bytes = ctx.art.serve_content(&hash).await?;
    Ok(axum::body::Bytes::from(bytes))
}
