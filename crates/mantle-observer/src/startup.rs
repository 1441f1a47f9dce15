//! Listener startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_observer`] which binds the listener socket eagerly and
//! then serves on a background Tokio task, so a bind failure surfaces to
//! the caller before anything else starts.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mantle_observer::{spawn_observer, AppState, ListenerSettings, ServerConfig};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(hub, ListenerSettings::default()));
//! let (addr, handle) = spawn_observer(&ServerConfig::default(), state, shutdown_rx).await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the listener.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the listener and serve it on a background Tokio task.
///
/// Returns the bound address (useful when `port` is 0) and the task
/// handle. The task runs until `shutdown` becomes `true`.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or the
/// port cannot be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Listener exited with error");
        }
    });

    tracing::info!(%addr, "Listener spawned on background task");

    Ok((addr, handle))
}
