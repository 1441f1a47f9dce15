//! Shared application state for the listener.
//!
//! [`AppState`] carries the [`Hub`] handle every connection registers
//! with, plus the per-connection settings the writer loop needs. It holds
//! no subscriber data of its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mantle_core::config::MantleConfig;
use mantle_core::hub::Hub;

/// Per-connection settings derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    /// Capacity of each connection's outbound frame queue.
    pub subscriber_buffer: usize,
    /// Maximum time a single socket write may take before the connection
    /// is abandoned.
    pub write_timeout: Duration,
    /// Tick period, reported by the status endpoint.
    pub tick_interval_ms: u64,
    /// Path of the WebSocket upgrade endpoint.
    pub path: String,
}

impl ListenerSettings {
    /// Derive listener settings from the full configuration.
    ///
    /// The socket write timeout reuses the hub's delivery timeout.
    pub fn from_config(config: &MantleConfig) -> Self {
        Self {
            subscriber_buffer: config.hub.subscriber_buffer,
            write_timeout: config.hub.send_timeout(),
            tick_interval_ms: config.generator.tick_interval_ms,
            path: config.server.path.clone(),
        }
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from_config(&MantleConfig::default())
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the hub actor.
    pub hub: Hub,
    /// Per-connection settings.
    pub settings: ListenerSettings,
    /// Wall-clock time the listener state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create listener state around an existing hub.
    pub fn new(hub: Hub, settings: ListenerSettings) -> Self {
        Self {
            hub,
            settings,
            started_at: Utc::now(),
        }
    }

    /// Whole seconds since the state was created.
    pub fn uptime_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}
