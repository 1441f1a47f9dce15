//! Shared type definitions for the Mantle broadcaster.
//!
//! This crate holds the value types that cross crate boundaries: the
//! [`StateRecord`] pushed to every subscriber, its derived [`Phase`], and
//! the [`SubscriberId`] that gives each connection handle its identity.
//! Types flow downstream to `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for subscriber identity
//! - [`phase`] -- Phase classification and its entropy thresholds
//! - [`state`] -- The immutable per-tick [`StateRecord`]

pub mod ids;
pub mod phase;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use ids::SubscriberId;
pub use phase::{Phase, PhaseThresholds};
pub use state::{MAX_ENTROPY, StateRecord};
