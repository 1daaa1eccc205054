//! Process entry point: wires every subsystem together. Grounded on the
//! teacher's flat `main` (config -> lock -> state -> spawn subsystems ->
//! serve -> graceful shutdown) rather than introducing a supervisor type.

use clap::Parser;
use lyricline_common::NowPlaying;
use lyricline_server::api::server;
use lyricline_server::art::providers::{
    ArtProvider, CoverArtArchiveProvider, FanartTvProvider, LastFmProvider,
};
use lyricline_server::art::ArtResolver;
use lyricline_server::bridge::source::BridgeSource;
use lyricline_server::bridge::BridgeHub;
use lyricline_server::cache::Cache;
use lyricline_server::config::{Args, Config};
use lyricline_server::fuser::Fuser;
use lyricline_server::lifecycle::{shutdown_signal, InstanceLock};
use lyricline_server::lyrics::providers::{
    kugou_provider, musixmatch_provider, netease_provider, LrclibProvider, LyricsProvider,
    StreamingInternalProvider,
};
use lyricline_server::lyrics::LyricsResolver;
use lyricline_server::settings::SettingsStore;
use lyricline_server::sources::mpris::MprisSource;
use lyricline_server::sources::music_assistant::MusicAssistantSource;
use lyricline_server::sources::spotify::SpotifySource;
use lyricline_server::sources::{MediaSource, SourceConfig, SourceRegistry};
use lyricline_server::state::AppContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = Config::load(&args);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let _instance_lock = match InstanceLock::claim(config.lock_path()) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::error!(error = %e, "another instance is already running");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    for dir in [config.lyrics_dir(), config.art_dir(), config.artists_dir()] {
        std::fs::create_dir_all(&dir)?;
    }

    let settings = Arc::new(SettingsStore::load(config.settings_path())?);

    let mut sources: Vec<Arc<dyn MediaSource>> = Vec::new();
    let mut source_configs: HashMap<lyricline_common::SourceId, SourceConfig> = HashMap::new();

    match MprisSource::connect("org.mpris.MediaPlayer2.spotify").await {
        Ok(mpris) => {
            let source: Arc<dyn MediaSource> = Arc::new(mpris);
            source_configs.insert(source.name(), source.config());
            sources.push(source);
        }
        Err(e) => tracing::info!(error = %e, "MPRIS source unavailable, skipping"),
    }

    let mut spotify_token_handle = None;
    if config.spotify_configured() {
        match SpotifySource::new(
            config.spotify_client_id.clone().unwrap(),
            config.spotify_client_secret.clone().unwrap(),
            config.spotify_redirect_uri.clone().unwrap(),
            config.token_path(),
        ) {
            Ok(spotify) => {
                spotify_token_handle = Some(spotify.access_token_handle());
                let source: Arc<dyn MediaSource> = Arc::new(spotify);
                source_configs.insert(source.name(), source.config());
                sources.push(source);
            }
            Err(e) => tracing::warn!(error = %e, "failed to construct streaming-service source"),
        }
    } else {
        tracing::info!("streaming-service credentials not configured, source disabled");
    }

    if let Some(ma_url) = config.music_assistant_url.clone() {
        let source: Arc<dyn MediaSource> =
            Arc::new(MusicAssistantSource::new(ma_url, config.music_assistant_latency_ms));
        source_configs.insert(source.name(), source.config());
        sources.push(source);
    }

    let bridge_hub = Arc::new(BridgeHub::new());
    let bridge_source: Arc<dyn MediaSource> =
        Arc::new(BridgeSource::new(bridge_hub.clone(), std::time::Duration::from_secs(10)));
    source_configs.insert(bridge_source.name(), bridge_source.config());
    sources.push(bridge_source);

    let registry = Arc::new(SourceRegistry::new(sources));

    let (snapshot_tx, snapshot_rx) = tokio::sync::mpsc::channel(256);
    let blocklist = Arc::new(RwLock::new(Vec::new()));
    for source in registry.sources() {
        let (mailbox_tx, mailbox_rx) = tokio::sync::watch::channel(None);
        tokio::spawn(lyricline_server::sources::run_source_loop(
            source.clone(),
            blocklist.clone(),
            mailbox_tx,
        ));
        tokio::spawn(lyricline_server::sources::forward_latest_snapshot(
            mailbox_rx,
            snapshot_tx.clone(),
        ));
    }
    drop(snapshot_tx);

    let (fuser, now_playing_rx, mut track_changed_rx) = Fuser::new(snapshot_rx, source_configs);

    let now_playing_state = Arc::new(tokio::sync::RwLock::new(NowPlaying::idle()));
    {
        let mut updates = fuser.subscribe();
        let now_playing_state = now_playing_state.clone();
        tokio::spawn(async move {
            while let Ok(update) = updates.recv().await {
                *now_playing_state.write().await = update;
            }
        });
    }

    let fuser_handle = tokio::spawn(fuser.run());

    let lyrics_cache: Cache<String, lyricline_common::LyricsDoc> = Cache::new(config.lyrics_dir());
    let mut lyrics_providers: Vec<Arc<dyn LyricsProvider>> = vec![
        Arc::new(LrclibProvider::new()),
        Arc::new(musixmatch_provider()),
        Arc::new(netease_provider()),
        Arc::new(kugou_provider()),
    ];
    if let Some(token_handle) = spotify_token_handle {
        lyrics_providers.push(Arc::new(StreamingInternalProvider::new(token_handle)));
    }
    let lyrics_resolver =
        Arc::new(LyricsResolver::new(lyrics_providers, lyrics_cache, settings.clone()));

    {
        let lyrics_resolver = lyrics_resolver.clone();
        tokio::spawn(async move {
            while let Ok(changed) = track_changed_rx.recv().await {
                if let Some(track_key) = changed.now_playing.track_key {
                    lyrics_resolver.cancel_in_flight(&track_key);
                }
            }
        });
    }

    let mut art_providers: Vec<Arc<dyn ArtProvider>> = vec![Arc::new(CoverArtArchiveProvider::new())];
    if let Some(key) = config.fanart_tv_api_key.clone() {
        art_providers.push(Arc::new(FanartTvProvider::new(key)));
    }
    if let Some(key) = config.lastfm_api_key.clone() {
        art_providers.push(Arc::new(LastFmProvider::new(key)));
    }
    let art_resolver = Arc::new(ArtResolver::new(
        art_providers,
        config.art_dir(),
        config.artists_dir(),
        config.data_dir.join("cache.meta"),
        settings.clone(),
    )?);

    let now_playing_rx_for_factory = now_playing_rx;
    let ctx = AppContext {
        sources: registry,
        now_playing: now_playing_state,
        now_playing_rx_factory: Arc::new(move || now_playing_rx_for_factory.resubscribe()),
        lyrics: lyrics_resolver,
        art: art_resolver,
        settings,
        bridge: bridge_hub,
        started_at: std::time::Instant::now(),
    };

    let cert_key = {
        let cert = config.cert_path();
        let key = config.key_path();
        (cert.exists() && key.exists()).then_some((cert, key))
    };

    server::serve(
        ctx,
        config.server_port,
        config.server_https_port,
        config.bind_all_interfaces,
        cert_key,
        shutdown_signal(),
    )
    .await?;

    fuser_handle.abort();
    Ok(())
}
