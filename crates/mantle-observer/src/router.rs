//! Axum router construction for the listener.
//!
//! Assembles the `WebSocket` upgrade route and the status routes into a
//! single [`Router`] with CORS enabled so browser clients served from any
//! origin can connect.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET {settings.path}` -- `WebSocket` state stream (default `/mantle`)
/// - `GET /api/status` -- hub counters
/// - `GET /health` -- liveness probe
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let stream_path = state.settings.path.clone();

    Router::new()
        .route("/", get(handlers::index))
        .route(&stream_path, get(ws::ws_subscribe))
        .route("/api/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
