//! Integration tests for the client gateway's HTTP surface.
//!
//! Grounded on the teacher's `tests/api_integration.rs` (build a router
//! against a real-but-empty engine, drive it with `tower::ServiceExt::oneshot`).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lyricline_common::NowPlaying;
use lyricline_server::api::server::build_router;
use lyricline_server::art::providers::CoverArtArchiveProvider;
use lyricline_server::art::ArtResolver;
use lyricline_server::bridge::BridgeHub;
use lyricline_server::lyrics::providers::LrclibProvider;
use lyricline_server::lyrics::LyricsResolver;
use lyricline_server::settings::SettingsStore;
use lyricline_server::sources::SourceRegistry;
use lyricline_server::state::AppContext;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_context() -> (AppContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(SettingsStore::load(dir.path().join("settings.json")).unwrap());

    let lyrics_cache = lyricline_server::cache::Cache::new(dir.path().join("lyrics"));
    let lyrics = Arc::new(LyricsResolver::new(
        vec![Arc::new(LrclibProvider::new())],
        lyrics_cache,
        settings.clone(),
    ));

    let art = Arc::new(
        ArtResolver::new(
            vec![Arc::new(CoverArtArchiveProvider::new())],
            dir.path().join("art"),
            dir.path().join("artists"),
            dir.path().join("cache.meta"),
            settings.clone(),
        )
        .unwrap(),
    );

    let (_tx, rx) = tokio::sync::broadcast::channel::<NowPlaying>(8);
    let ctx = AppContext {
        sources: Arc::new(SourceRegistry::new(Vec::new())),
        now_playing: Arc::new(tokio::sync::RwLock::new(NowPlaying::idle())),
        now_playing_rx_factory: Arc::new(move || rx.resubscribe()),
        lyrics,
        art,
        settings,
        bridge: Arc::new(BridgeHub::new()),
        started_at: std::time::Instant::now(),
    };
    (ctx, dir)
}

async fn request(
    app: &axum::Router,
    method: &str,
    path: &str,
) -> (StatusCode, Option<Value>) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let (status, body) = request(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");
}

#[tokio::test]
async fn current_track_reports_idle_with_no_sources() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let (status, body) = request(&app, "GET", "/current-track").await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert!(body["track_key"].is_null());
    assert_eq!(body["is_playing"], false);
}

#[tokio::test]
async fn lyrics_reports_instrumental_when_idle() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let (status, body) = request(&app, "GET", "/lyrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["is_instrumental"], true);
}

#[tokio::test]
async fn providers_available_is_empty_with_no_current_track() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let (status, body) = request(&app, "GET", "/api/providers/available").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), serde_json::json!([]));
}

#[tokio::test]
async fn setting_album_art_preference_without_a_track_is_a_bad_request() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let request = Request::builder()
        .method("POST")
        .uri("/api/album-art/preference")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "provider": "fanart_tv" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    // Never-an-HTTP-error rule: NotFound/Misconfigured map to 200, but this
    // is a genuine client error (BadRequest), which stays a 4xx.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn playback_control_with_no_capable_source_reports_failure_in_body_not_status() {
    let (ctx, _dir) = test_context().await;
    let app = build_router(ctx);
    let request = Request::builder()
        .method("POST")
        .uri("/api/playback/next")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}
