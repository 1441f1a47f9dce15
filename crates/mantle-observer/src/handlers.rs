//! HTTP endpoint handlers for the listener.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Hub counters and tick settings as JSON |
//! | `GET` | `/health` | Liveness probe |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Records fanned out since start.
    pub published: u64,
    /// Individual successful deliveries since start.
    pub delivered: u64,
    /// Subscribers removed after a failed delivery.
    pub dropped_subscribers: u64,
    /// Tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// WebSocket upgrade path.
    pub stream_path: String,
    /// Seconds since the listener started.
    pub uptime_seconds: i64,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing hub counters and endpoint links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, subscribers, published) = match state.hub.stats().await {
        Ok(stats) => ("RUNNING", stats.subscribers, stats.published),
        Err(_) => ("STOPPED", 0, 0),
    };
    let path = &state.settings.path;
    let tick_interval_ms = state.settings.tick_interval_ms;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Mantle</title>
    <style>
        body {{
            background: #000;
            color: #0f0;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        .metric {{
            display: inline-block;
            border: 1px solid #0f0;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ font-size: 0.85rem; opacity: 0.7; }}
        .metric .value {{ font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #0f0; }}
    </style>
</head>
<body>
    <h1>Mantle</h1>
    <p>Status: <strong>{status}</strong></p>

    <div>
        <div class="metric">
            <div class="label">Subscribers</div>
            <div class="value">{subscribers}</div>
        </div>
        <div class="metric">
            <div class="label">Published</div>
            <div class="value">{published}</div>
        </div>
        <div class="metric">
            <div class="label">Tick (ms)</div>
            <div class="value">{tick_interval_ms}</div>
        </div>
    </div>

    <h2>Endpoints</h2>
    <ul>
        <li><code>ws://host:port{path}</code> -- Live state stream</li>
        <li><a href="/api/status">/api/status</a> -- Hub counters</li>
        <li><a href="/health">/health</a> -- Liveness</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Return the hub counters and tick settings.
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ObserverError> {
    let stats = state.hub.stats().await?;
    Ok(Json(StatusResponse {
        subscribers: stats.subscribers,
        published: stats.published,
        delivered: stats.delivered,
        dropped_subscribers: stats.dropped_subscribers,
        tick_interval_ms: state.settings.tick_interval_ms,
        stream_path: state.settings.path.clone(),
        uptime_seconds: state.uptime_seconds(),
    }))
}

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
