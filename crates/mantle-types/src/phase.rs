//! Phase classification.
//!
//! The phase is never stored independently of entropy: it is always
//! derived from the entropy value and a pair of thresholds.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Default threshold above which entropy is classified as [`Phase::Chaos`].
pub const DEFAULT_CHAOS_ABOVE: f64 = 1.2;

/// Default threshold below which entropy is classified as [`Phase::Void`].
pub const DEFAULT_VOID_BELOW: f64 = 0.2;

/// Categorical label derived from the entropy value of a state record.
///
/// Serialized as the bare variant name (`"Stable"`, `"Chaos"`, `"Void"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Entropy between the two thresholds (inclusive).
    Stable,
    /// Entropy strictly above the chaos threshold.
    Chaos,
    /// Entropy strictly below the void threshold.
    Void,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Stable => "Stable",
            Self::Chaos => "Chaos",
            Self::Void => "Void",
        };
        f.write_str(label)
    }
}

/// Entropy thresholds used to classify a [`Phase`].
///
/// Both comparisons are strict, so an entropy exactly equal to either
/// threshold is [`Phase::Stable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    /// Entropy strictly greater than this is [`Phase::Chaos`].
    #[serde(default = "default_chaos_above")]
    pub chaos_above: f64,
    /// Entropy strictly less than this is [`Phase::Void`].
    #[serde(default = "default_void_below")]
    pub void_below: f64,
}

impl PhaseThresholds {
    /// Classify an entropy value.
    pub fn classify(&self, entropy: f64) -> Phase {
        if entropy > self.chaos_above {
            Phase::Chaos
        } else if entropy < self.void_below {
            Phase::Void
        } else {
            Phase::Stable
        }
    }
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            chaos_above: DEFAULT_CHAOS_ABOVE,
            void_below: DEFAULT_VOID_BELOW,
        }
    }
}

const fn default_chaos_above() -> f64 {
    DEFAULT_CHAOS_ABOVE
}

const fn default_void_below() -> f64 {
    DEFAULT_VOID_BELOW
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_classify() {
        let t = PhaseThresholds::default();
        assert_eq!(t.classify(1.5), Phase::Chaos);
        assert_eq!(t.classify(0.1), Phase::Void);
        assert_eq!(t.classify(0.7), Phase::Stable);
    }

    #[test]
    fn boundaries_are_stable() {
        let t = PhaseThresholds::default();
        assert_eq!(t.classify(1.2), Phase::Stable);
        assert_eq!(t.classify(0.2), Phase::Stable);
    }

    #[test]
    fn custom_thresholds() {
        let t = PhaseThresholds {
            chaos_above: 1.0,
            void_below: 0.5,
        };
        assert_eq!(t.classify(1.1), Phase::Chaos);
        assert_eq!(t.classify(0.4), Phase::Void);
        assert_eq!(t.classify(0.75), Phase::Stable);
    }

    #[test]
    fn phase_serializes_as_bare_name() {
        assert_eq!(serde_json::to_string(&Phase::Chaos).unwrap(), "\"Chaos\"");
        assert_eq!(serde_json::to_string(&Phase::Void).unwrap(), "\"Void\"");
        assert_eq!(serde_json::to_string(&Phase::Stable).unwrap(), "\"Stable\"");
    }

    #[test]
    fn missing_threshold_fields_take_defaults() {
        let t: PhaseThresholds = serde_json::from_str(r#"{"chaos_above": 1.4}"#).unwrap();
        assert!((t.chaos_above - 1.4).abs() < f64::EPSILON);
        assert!((t.void_below - DEFAULT_VOID_BELOW).abs() < f64::EPSILON);
    }
}
