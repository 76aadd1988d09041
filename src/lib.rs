// Public API for integration tests and potential library usage

pub mod abuse;
pub mod api;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod hub;
pub mod protocol;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

// Background tasks
pub mod broadcast;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use state::AppState;

/// Build the full application router
pub fn app(state: Arc<AppState>, abuse_config: Arc<abuse::AbuseConfig>) -> Router {
    // WebSocket route with anti-abuse protection
    let ws_routes = Router::new()
        .route("/ws/comments", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            abuse_config,
            abuse::ws_abuse_middleware,
        ));

    let static_dir = state.config.static_dir.clone();

    Router::new()
        .nest("/api", api::routes())
        .merge(ws_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
