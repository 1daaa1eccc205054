//! Route assembly, grounded on `wkmp_ap::api::server::run`'s
//! `Router::new()....with_state(ctx).layer(cors)` shape.

use super::handlers;
use crate::state::AppContext;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::build_info))
        .route("/current-track", get(handlers::current_track))
        .route("/lyrics", get(handlers::lyrics))
        .route("/config", get(handlers::config))
        .route("/api/providers/available", get(handlers::providers_available))
        .route(
            "/api/providers/preference",
            post(handlers::set_provider_preference).delete(handlers::clear_provider_preference),
        )
        .route("/api/album-art/options", get(handlers::album_art_options))
        .route("/api/album-art/preference", post(handlers::set_album_art_preference))
        .route(
            "/api/album-art/background-style",
            post(handlers::set_background_style),
        )
        .route("/api/playback/play-pause", post(handlers::playback_play_pause))
        .route("/api/playback/next", post(handlers::playback_next))
        .route("/api/playback/previous", post(handlers::playback_previous))
        .route("/api/playback/queue", get(handlers::playback_queue))
        .route(
            "/api/playback/liked",
            get(handlers::playback_liked_get).post(handlers::playback_liked_post),
        )
        .route("/api/slideshow/random-images", get(handlers::slideshow_random_images))
        .route("/cover-art/:hash", get(handlers::cover_art))
        .route("/artist-images/:artist_key/:index", get(handlers::artist_image))
        .route("/ws/spicetify", get(super::ws::spicetify_ws))
        .route("/events", get(super::ws::events_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Binds the HTTP listener (and, when cert/key files exist, an HTTPS
/// listener) and serves until the supervisor cancels it.
pub async fn serve(
    ctx: AppContext,
    http_port: u16,
    https_port: u16,
    bind_all_interfaces: bool,
    cert_key: Option<(std::path::PathBuf, std::path::PathBuf)>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let router = build_router(ctx);

    // The bridge socket (`/ws/spicetify`) is authenticated only by locality,
    // so the gateway binds loopback-only unless explicitly widened.
    let ip = if bind_all_interfaces {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };
    let addr = SocketAddr::from((ip, http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    if let Some((_cert, _key)) = cert_key {
        tracing::info!(port = https_port, "HTTPS certificate present; TLS termination is out of scope for this process and expected to be handled by a reverse proxy");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
