//! The state record broadcast to every subscriber once per tick.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::phase::{Phase, PhaseThresholds};

/// Upper bound of the entropy range (the golden ratio, rounded).
pub const MAX_ENTROPY: f64 = 1.618;

/// One generated telemetry state.
///
/// Constructed once per tick by the generator and never mutated. The
/// [`Phase`] is derived from entropy at construction time, and entropy is
/// clamped into `[0, MAX_ENTROPY]` so the range invariant holds for any
/// state function.
///
/// Wire shape: `{"rpm": f64, "entropy": f64, "cycle": u64, "phase": "Stable", "ts": i64}`.
///
/// Decoding checks the range invariants: a record whose entropy is outside
/// `[0, MAX_ENTROPY]` or whose numbers are not finite is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(try_from = "WireRecord")]
#[ts(export, export_to = "bindings/")]
pub struct StateRecord {
    rpm: f64,
    entropy: f64,
    #[ts(type = "number")]
    cycle: u64,
    phase: Phase,
    #[serde(rename = "ts")]
    #[ts(type = "number")]
    timestamp_nanos: i64,
}

impl StateRecord {
    /// Build a record, clamping entropy and deriving its phase.
    ///
    /// A `NaN` entropy is treated as zero.
    pub fn new(
        cycle: u64,
        rpm: f64,
        entropy: f64,
        thresholds: &PhaseThresholds,
        timestamp_nanos: i64,
    ) -> Self {
        let entropy = if entropy.is_nan() {
            0.0
        } else {
            entropy.clamp(0.0, MAX_ENTROPY)
        };
        Self {
            rpm,
            entropy,
            cycle,
            phase: thresholds.classify(entropy),
            timestamp_nanos,
        }
    }

    /// Revolutions per minute.
    pub const fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Entropy, always within `[0, MAX_ENTROPY]`.
    pub const fn entropy(&self) -> f64 {
        self.entropy
    }

    /// The tick number that produced this record (first record is 1).
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Phase derived from entropy.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Wall-clock creation time in nanoseconds since the Unix epoch.
    pub const fn timestamp_nanos(&self) -> i64 {
        self.timestamp_nanos
    }
}

/// Unchecked wire form used only while decoding.
#[derive(Deserialize)]
struct WireRecord {
    rpm: f64,
    entropy: f64,
    cycle: u64,
    phase: Phase,
    ts: i64,
}

impl TryFrom<WireRecord> for StateRecord {
    type Error = &'static str;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        if !wire.rpm.is_finite() {
            return Err("rpm must be finite");
        }
        if !(0.0..=MAX_ENTROPY).contains(&wire.entropy) {
            return Err("entropy must lie within [0, 1.618]");
        }
        Ok(Self {
            rpm: wire.rpm,
            entropy: wire.entropy,
            cycle: wire.cycle,
            phase: wire.phase,
            timestamp_nanos: wire.ts,
        })
    }
}
