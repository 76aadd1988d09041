use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starguess::{
    abuse, broadcast,
    clock::SystemClock,
    config::AppConfig,
    state::AppState,
    store::{DocumentStore, JsonFileStore},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starguess=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting starguess...");

    let config = AppConfig::from_env();
    let abuse_config = Arc::new(abuse::AbuseConfig::from_env());

    let store: Arc<dyn DocumentStore> = match JsonFileStore::open(&config.data_dir).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Cannot open data directory {}: {}", config.data_dir.display(), e);
            std::process::exit(1);
        }
    };

    let bind_addr = config.bind_addr;
    let state = match AppState::load(config, store, Arc::new(SystemClock)).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };

    // Rotate stale modes now and then keep watching the date
    broadcast::spawn_daily_rollover(state.clone());

    broadcast::spawn_session_sweeper(state.clone());

    let sweep_interval = state.config.sweep_interval;
    broadcast::spawn_rate_limiter_cleanup(state.comment_limiter.clone(), sweep_interval);
    if let Some(limiter) = abuse_config.rate_limiter.clone() {
        broadcast::spawn_rate_limiter_cleanup(limiter, sweep_interval);
    }

    let app = starguess::app(state, abuse_config);

    tracing::info!("Listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
