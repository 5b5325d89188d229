use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use undercover::{
    api,
    broadcast::{self, RoomBroadcaster},
    config::ServerConfig,
    corpus::MemoryCorpus,
    state::AppState,
    store::MemoryRoomStore,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "undercover=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Undercover...");

    let config = ServerConfig::from_env();

    let corpus = match MemoryCorpus::from_json_file(&config.corpus_path) {
        Ok(corpus) => {
            tracing::info!(
                cards = corpus.len(),
                languages = ?corpus.languages(),
                "Word corpus loaded"
            );
            corpus
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load word corpus from {}: {}. Games cannot start.",
                config.corpus_path.display(),
                e
            );
            MemoryCorpus::default()
        }
    };

    let state = Arc::new(
        AppState::new(
            Arc::new(MemoryRoomStore::new()),
            Arc::new(corpus),
            RoomBroadcaster::new(config.broadcast_capacity),
        )
        .with_commit_attempts(config.commit_attempts),
    );

    broadcast::spawn_stale_room_sweeper(state.clone(), config.room_ttl, config.sweep_interval);

    let app = api::router()
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
