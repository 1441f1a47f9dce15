//! Engine binary for the Mantle broadcaster.
//!
//! Wires the three runtime pieces together and runs them until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `MANTLE_CONFIG` (default `mantle-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the broadcast hub
//! 4. Bind and spawn the subscriber listener (bind failure is fatal)
//! 5. Spawn the state generator
//!
//! # Shutdown Sequence
//!
//! 1. Stop the generator and begin listener shutdown
//! 2. Shut the hub down, closing every subscriber connection
//! 3. Wait for the listener to drain

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use mantle_core::config::{ConfigSource, LoggingConfig, MantleConfig};
use mantle_core::generator::{Generator, ReferenceCurve};
use mantle_core::hub::Hub;
use mantle_observer::server::ServerConfig;
use mantle_observer::state::{AppState, ListenerSettings};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "mantle-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the listener cannot
/// bind, or a background task fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run().await?;
    Ok(())
}

async fn run() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config_path = std::env::var_os("MANTLE_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, source) = MantleConfig::load_or_default(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    if source == ConfigSource::Defaults {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        path = %config_path.display(),
        ?source,
        host = config.server.host,
        port = config.server.port,
        stream_path = config.server.path,
        tick_interval_ms = config.generator.tick_interval_ms,
        chaos_above = config.phase.chaos_above,
        void_below = config.phase.void_below,
        "Configuration loaded"
    );

    // 3. Spawn the hub.
    let (hub, hub_task) = Hub::spawn(&config.hub);

    // 4. Bind and spawn the listener.
    let (stop_tx, stop_rx) = watch::channel(false);
    let app_state = Arc::new(AppState::new(
        hub.clone(),
        ListenerSettings::from_config(&config),
    ));
    let server_config = ServerConfig::from_section(&config.server);
    let (addr, server_task) =
        mantle_observer::spawn_observer(&server_config, app_state, stop_rx.clone()).await?;
    info!(%addr, path = config.server.path, "Mantle active, awaiting subscribers");

    // 5. Spawn the generator.
    let generator = Generator::new(
        ReferenceCurve::from_config(&config.generator),
        config.phase,
        config.generator.tick_interval(),
    );
    let publisher = hub.clone();
    let generator_task = tokio::spawn(async move { generator.run(&publisher, stop_rx).await });

    // Run until Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // The generator and listener both watch this flag.
    let _ = stop_tx.send(true);
    let generator_report = generator_task.await?;

    hub.shutdown().await;
    let hub_report = hub_task.await?;
    server_task.await?;

    info!(
        last_cycle = generator_report.last_cycle,
        published = generator_report.published,
        skipped = generator_report.skipped,
        delivered = hub_report.stats.delivered,
        dropped_subscribers = hub_report.stats.dropped_subscribers,
        closed_on_shutdown = hub_report.closed_on_shutdown,
        "Mantle stopped"
    );

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
