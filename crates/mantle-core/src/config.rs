//! Configuration loading and typed config structures for the Mantle broadcaster.
//!
//! The configuration lives in `mantle-config.yaml`. Every field has a
//! default, so a missing file or a missing section still produces a valid
//! configuration. A small set of environment variables override the file:
//!
//! - `MANTLE_HOST` overrides `server.host`
//! - `MANTLE_PORT` overrides `server.port`
//! - `MANTLE_TICK_INTERVAL_MS` overrides `generator.tick_interval_ms`

use std::path::Path;
use std::time::Duration;

use mantle_types::{MAX_ENTROPY, PhaseThresholds};
use serde::Deserialize;

/// Routes served by the listener that the stream path may not shadow.
const RESERVED_PATHS: [&str; 3] = ["/", "/api/status", "/health"];

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for environment variable {var}")]
    Env {
        /// The variable name.
        var: &'static str,
        /// The raw value found in the environment.
        value: String,
    },

    /// The configuration parsed but violates a constraint.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level broadcaster configuration.
///
/// Mirrors the structure of `mantle-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MantleConfig {
    /// Listener address and upgrade path.
    #[serde(default)]
    pub server: ServerSection,

    /// Tick cadence and reference curve parameters.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Entropy thresholds for phase classification.
    #[serde(default)]
    pub phase: PhaseThresholds,

    /// Hub buffering and delivery timeouts.
    #[serde(default)]
    pub hub: HubConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MantleConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, and
    /// [`ConfigError::Env`] / [`ConfigError::Invalid`] for bad values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    ///
    /// Environment overrides and validation apply in both cases. The
    /// returned [`ConfigSource`] says which one happened, so the caller can
    /// log it once logging is up.
    ///
    /// # Errors
    ///
    /// Same as [`MantleConfig::from_file`].
    pub fn load_or_default(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        if path.exists() {
            return Ok((Self::from_file(path)?, ConfigSource::File));
        }
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, ConfigSource::Defaults))
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MANTLE_HOST") {
            self.server.host = host;
        }
        if let Some(value) = lookup("MANTLE_PORT") {
            self.server.port = value.parse().map_err(|_parse| ConfigError::Env {
                var: "MANTLE_PORT",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("MANTLE_TICK_INTERVAL_MS") {
            self.generator.tick_interval_ms =
                value.parse().map_err(|_parse| ConfigError::Env {
                    var: "MANTLE_TICK_INTERVAL_MS",
                    value: value.clone(),
                })?;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            reason: reason.to_owned(),
        };

        if self.generator.tick_interval_ms == 0 {
            return Err(invalid("generator.tick_interval_ms must be at least 1"));
        }
        if !self.generator.base_rpm.is_finite() {
            return Err(invalid("generator.base_rpm must be a finite number"));
        }
        if !self.generator.time_step.is_finite() {
            return Err(invalid("generator.time_step must be a finite number"));
        }
        if self.hub.command_buffer == 0 {
            return Err(invalid("hub.command_buffer must be at least 1"));
        }
        if self.hub.subscriber_buffer == 0 {
            return Err(invalid("hub.subscriber_buffer must be at least 1"));
        }
        if self.hub.send_timeout_ms == 0 {
            return Err(invalid("hub.send_timeout_ms must be at least 1"));
        }
        let range = 0.0..=MAX_ENTROPY;
        if !range.contains(&self.phase.void_below) || !range.contains(&self.phase.chaos_above) {
            return Err(invalid("phase thresholds must lie within [0, 1.618]"));
        }
        if self.phase.void_below >= self.phase.chaos_above {
            return Err(invalid("phase.void_below must be less than phase.chaos_above"));
        }
        if !self.server.path.starts_with('/') {
            return Err(invalid("server.path must start with '/'"));
        }
        if RESERVED_PATHS.contains(&self.server.path.as_str()) {
            return Err(invalid("server.path collides with a status route"));
        }
        Ok(())
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the configuration file.
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Host address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the WebSocket upgrade endpoint.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

/// State generator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorConfig {
    /// Real-time milliseconds between ticks (60 ms is roughly 16 updates per second).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Baseline RPM the reference curve oscillates around.
    #[serde(default = "default_base_rpm")]
    pub base_rpm: f64,

    /// Synthetic time advanced per cycle by the reference curve.
    #[serde(default = "default_time_step")]
    pub time_step: f64,
}

impl GeneratorConfig {
    /// The tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            base_rpm: default_base_rpm(),
            time_step: default_time_step(),
        }
    }
}

/// Hub buffering and delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Capacity of the command channel feeding the hub actor. When full,
    /// `publish` waits rather than dropping a record.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Capacity of each subscriber's outbound frame queue.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Maximum time a single delivery may wait on a full subscriber queue
    /// before that subscriber is dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl HubConfig {
    /// The per-delivery timeout as a [`Duration`].
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            subscriber_buffer: default_subscriber_buffer(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    String::from("/mantle")
}

const fn default_tick_interval_ms() -> u64 {
    60
}

const fn default_base_rpm() -> f64 {
    33.33
}

const fn default_time_step() -> f64 {
    0.06
}

const fn default_command_buffer() -> usize {
    64
}

const fn default_subscriber_buffer() -> usize {
    32
}

const fn default_send_timeout_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    String::from("info")
}
