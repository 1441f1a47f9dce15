//! Subscriber listener for the Mantle broadcaster.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/mantle` by default) that upgrades each
//!   request into a persistent connection and registers it with the
//!   [`Hub`](mantle_core::hub::Hub)
//! - **Status endpoints** (`/api/status`, `/health`) for monitoring
//! - **Minimal HTML page** (`GET /`) showing live counters
//!
//! # Architecture
//!
//! The listener never touches the subscriber set. Each connection gets a
//! [`SubscriberHandle`](mantle_core::hub::SubscriberHandle) whose outbound
//! queue is drained by a writer loop that owns the socket. The hub decides
//! membership; the writer only forwards frames and reports the disconnect.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::spawn_observer;
pub use state::{AppState, ListenerSettings};
