//! Broadcast hub, state generator, and configuration for the Mantle broadcaster.
//!
//! The generator produces one [`StateRecord`] per tick and publishes it to
//! the hub; the hub fans each record out to every registered subscriber.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `mantle-config.yaml` into
//!   strongly-typed structs.
//! - [`generator`] -- Tick counter, pluggable [`StateFunction`], and the
//!   periodic [`Generator`] loop.
//! - [`hub`] -- The [`Hub`] actor that owns the subscriber set.
//!
//! [`StateRecord`]: mantle_types::StateRecord
//! [`StateFunction`]: generator::StateFunction
//! [`Generator`]: generator::Generator
//! [`Hub`]: hub::Hub

pub mod config;
pub mod generator;
pub mod hub;

pub use config::{
    ConfigError, ConfigSource, GeneratorConfig, HubConfig, LoggingConfig, MantleConfig,
    ServerSection,
};
pub use generator::{Generator, GeneratorReport, GeneratorStop, ReferenceCurve, StateFunction};
pub use hub::{Frame, Hub, HubError, HubReport, HubStats, SubscriberHandle};
