//! State generator: the periodic producer of [`StateRecord`]s.
//!
//! Each tick advances a [`TickCounter`], samples a pluggable
//! [`StateFunction`] at the new cycle, stamps the result into a record, and
//! hands it to a [`StatePublisher`] (the hub in production).
//!
//! # Cycle policy
//!
//! - The counter advances exactly once per tick, never while a publish
//!   handoff is waiting. Under backpressure the wall-clock cadence drifts
//!   but `cycle` stays a gapless count of ticks.
//! - If the state function fails, that tick's cycle number is consumed and
//!   logged as skipped; the next record carries the following cycle.

use std::future::Future;
use std::time::Duration;

use mantle_types::{MAX_ENTROPY, PhaseThresholds, StateRecord};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::GeneratorConfig;
use crate::hub::{Hub, HubError};

/// Errors that can occur while producing a record.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Cycle counter would overflow.
    #[error("cycle counter overflow: cannot advance beyond u64::MAX")]
    CycleOverflow,

    /// The state function could not produce a sample for this cycle.
    #[error("state function failed at cycle {cycle}: {reason}")]
    Sample {
        /// The cycle that was skipped.
        cycle: u64,
        /// Explanation from the state function.
        reason: String,
    },
}

/// Raw output of a [`StateFunction`] before it becomes a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Revolutions per minute.
    pub rpm: f64,
    /// Entropy; clamped into `[0, MAX_ENTROPY]` when the record is built.
    pub entropy: f64,
}

/// A deterministic function of the cycle number.
pub trait StateFunction: Send {
    /// Produce the sample for `cycle`.
    fn sample(&mut self, cycle: u64) -> Result<Sample, GeneratorError>;
}

/// The reference curve: two sinusoids for RPM and a scaled absolute
/// sinusoid for entropy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCurve {
    /// Baseline RPM.
    pub base_rpm: f64,
    /// Synthetic time per cycle.
    pub time_step: f64,
}

impl ReferenceCurve {
    /// Build the curve from generator configuration.
    pub const fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            base_rpm: config.base_rpm,
            time_step: config.time_step,
        }
    }
}

impl Default for ReferenceCurve {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}

impl StateFunction for ReferenceCurve {
    #[allow(clippy::cast_precision_loss)]
    fn sample(&mut self, cycle: u64) -> Result<Sample, GeneratorError> {
        let t = cycle as f64 * self.time_step;
        let rpm = self.base_rpm + t.sin().mul_add(20.0, (t * 0.5).cos() * 10.0);
        let entropy = (t * 0.1).sin().abs() * MAX_ENTROPY;
        Ok(Sample { rpm, entropy })
    }
}

/// Monotonic tick counter. The first cycle handed out is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounter {
    cycle: u64,
}

impl TickCounter {
    /// A counter that has not ticked yet.
    pub const fn new() -> Self {
        Self { cycle: 0 }
    }

    /// The last cycle handed out (0 before the first tick).
    pub const fn current(&self) -> u64 {
        self.cycle
    }

    /// Advance and return the new cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::CycleOverflow`] at `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, GeneratorError> {
        self.cycle = self
            .cycle
            .checked_add(1)
            .ok_or(GeneratorError::CycleOverflow)?;
        Ok(self.cycle)
    }
}

/// Destination for generated records.
pub trait StatePublisher: Sync {
    /// Hand off one record, waiting only for acceptance.
    fn publish(&self, record: StateRecord) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl StatePublisher for Hub {
    fn publish(&self, record: StateRecord) -> impl Future<Output = Result<(), HubError>> + Send {
        Self::publish(self, record)
    }
}

/// Why the generator loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStop {
    /// The shutdown signal fired.
    Shutdown,
    /// The publisher refused further records.
    PublisherClosed,
    /// The cycle counter is exhausted.
    CycleOverflow,
}

/// Summary of a generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorReport {
    /// Why the loop stopped.
    pub stop: GeneratorStop,
    /// Records accepted by the publisher.
    pub published: u64,
    /// Ticks whose state function failed.
    pub skipped: u64,
    /// The last cycle number consumed.
    pub last_cycle: u64,
}

/// Periodic state producer.
#[derive(Debug)]
pub struct Generator<F> {
    function: F,
    thresholds: PhaseThresholds,
    interval: Duration,
    counter: TickCounter,
}

impl<F: StateFunction> Generator<F> {
    /// Create a generator that ticks every `interval`.
    pub const fn new(function: F, thresholds: PhaseThresholds, interval: Duration) -> Self {
        Self {
            function,
            thresholds,
            interval,
            counter: TickCounter::new(),
        }
    }

    /// The last cycle consumed.
    pub const fn cycle(&self) -> u64 {
        self.counter.current()
    }

    /// Advance one tick and build its record.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::CycleOverflow`] when the counter is
    /// exhausted, or [`GeneratorError::Sample`] if the state function fails
    /// or yields a non-finite RPM (the cycle is still consumed).
    pub fn next_record(&mut self) -> Result<StateRecord, GeneratorError> {
        let cycle = self.counter.advance()?;
        let sample = self.function.sample(cycle)?;
        if !sample.rpm.is_finite() {
            return Err(GeneratorError::Sample {
                cycle,
                reason: format!("non-finite rpm {}", sample.rpm),
            });
        }
        let ts = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Ok(StateRecord::new(
            cycle,
            sample.rpm,
            sample.entropy,
            &self.thresholds,
            ts,
        ))
    }

    /// Run the tick loop until shutdown or until the publisher closes.
    ///
    /// Missed ticks are delayed, not skipped: a slow handoff pushes the
    /// schedule back instead of bursting to catch up.
    pub async fn run<P: StatePublisher>(
        mut self,
        publisher: &P,
        mut shutdown: watch::Receiver<bool>,
    ) -> GeneratorReport {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut published: u64 = 0;
        let mut skipped: u64 = 0;

        info!(interval = ?self.interval, "Generator starting");

        let stop = loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break GeneratorStop::Shutdown,
                _ = ticker.tick() => {}
            }

            let record = match self.next_record() {
                Ok(record) => record,
                Err(GeneratorError::Sample { cycle, reason }) => {
                    skipped = skipped.saturating_add(1);
                    warn!(cycle, %reason, "State function failed, cycle skipped");
                    continue;
                }
                Err(e @ GeneratorError::CycleOverflow) => {
                    error!(error = %e, "Generator cannot continue");
                    break GeneratorStop::CycleOverflow;
                }
            };

            debug!(cycle = record.cycle(), phase = %record.phase(), "Tick");

            if publisher.publish(record).await.is_err() {
                info!(cycle = record.cycle(), "Publisher closed, generator stopping");
                break GeneratorStop::PublisherClosed;
            }
            published = published.saturating_add(1);
        };

        let report = GeneratorReport {
            stop,
            published,
            skipped,
            last_cycle: self.counter.current(),
        };
        info!(
            stop = ?report.stop,
            published = report.published,
            skipped = report.skipped,
            last_cycle = report.last_cycle,
            "Generator stopped"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use mantle_types::Phase;

    use super::*;

    /// Collects records in memory; closes after `limit` records.
    struct Collector {
        records: Mutex<Vec<StateRecord>>,
        limit: usize,
    }

    impl Collector {
        fn new(limit: usize) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                limit,
            }
        }

        fn cycles(&self) -> Vec<u64> {
            self.records.lock().unwrap().iter().map(StateRecord::cycle).collect()
        }
    }

    impl StatePublisher for Collector {
        fn publish(
            &self,
            record: StateRecord,
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            let result = {
                let mut records = self.records.lock().unwrap();
                if records.len() >= self.limit {
                    Err(HubError::Closed)
                } else {
                    records.push(record);
                    Ok(())
                }
            };
            std::future::ready(result)
        }
    }

    /// Fails on every cycle divisible by three.
    struct Flaky;

    impl StateFunction for Flaky {
        fn sample(&mut self, cycle: u64) -> Result<Sample, GeneratorError> {
            if cycle % 3 == 0 {
                return Err(GeneratorError::Sample {
                    cycle,
                    reason: String::from("unlucky"),
                });
            }
            Ok(Sample {
                rpm: 1.0,
                entropy: 0.5,
            })
        }
    }

    #[test]
    fn counter_starts_at_one() {
        let mut counter = TickCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.advance().unwrap(), 1);
        assert_eq!(counter.advance().unwrap(), 2);
    }

    #[test]
    fn counter_overflow_is_error() {
        let mut counter = TickCounter { cycle: u64::MAX };
        assert!(matches!(
            counter.advance(),
            Err(GeneratorError::CycleOverflow)
        ));
    }

    #[test]
    fn reference_curve_respects_invariants() {
        let thresholds = PhaseThresholds::default();
        let mut generator = Generator::new(
            ReferenceCurve::default(),
            thresholds,
            Duration::from_millis(60),
        );
        let mut seen = [false; 3];
        for expected in 1..=100_000_u64 {
            let record = generator.next_record().unwrap();
            assert_eq!(record.cycle(), expected);
            let entropy = record.entropy();
            assert!((0.0..=MAX_ENTROPY).contains(&entropy));
            let phase = record.phase();
            assert_eq!(phase == Phase::Chaos, entropy > 1.2);
            assert_eq!(phase == Phase::Void, entropy < 0.2);
            let slot = match phase {
                Phase::Stable => &mut seen[0],
                Phase::Chaos => &mut seen[1],
                Phase::Void => &mut seen[2],
            };
            *slot = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn reference_curve_is_deterministic() {
        let mut a = ReferenceCurve::default();
        let mut b = ReferenceCurve::default();
        for cycle in [1, 17, 4_096] {
            assert_eq!(a.sample(cycle).unwrap(), b.sample(cycle).unwrap());
        }
    }

    #[test]
    fn failed_sample_consumes_cycle() {
        let mut generator =
            Generator::new(Flaky, PhaseThresholds::default(), Duration::from_millis(1));
        assert_eq!(generator.next_record().unwrap().cycle(), 1);
        assert_eq!(generator.next_record().unwrap().cycle(), 2);
        assert!(matches!(
            generator.next_record(),
            Err(GeneratorError::Sample { cycle: 3, .. })
        ));
        assert_eq!(generator.next_record().unwrap().cycle(), 4);
    }

    #[test]
    fn non_finite_rpm_is_a_failed_sample() {
        let curve = ReferenceCurve {
            base_rpm: f64::NAN,
            time_step: 0.06,
        };
        let mut generator =
            Generator::new(curve, PhaseThresholds::default(), Duration::from_millis(1));
        assert!(matches!(
            generator.next_record(),
            Err(GeneratorError::Sample { cycle: 1, .. })
        ));
        assert_eq!(generator.cycle(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_publishes_contiguous_cycles_until_publisher_closes() {
        let collector = Collector::new(5);
        let generator = Generator::new(
            ReferenceCurve::default(),
            PhaseThresholds::default(),
            Duration::from_millis(60),
        );
        let (_stop_tx, stop_rx) = watch::channel(false);

        let report = generator.run(&collector, stop_rx).await;

        assert_eq!(report.stop, GeneratorStop::PublisherClosed);
        assert_eq!(report.published, 5);
        assert_eq!(collector.cycles(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_logs_and_skips_failed_ticks() {
        let collector = Collector::new(4);
        let generator = Generator::new(Flaky, PhaseThresholds::default(), Duration::from_millis(10));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let report = generator.run(&collector, stop_rx).await;

        assert_eq!(collector.cycles(), vec![1, 2, 4, 5]);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let collector = Collector::new(usize::MAX);
        let generator = Generator::new(
            ReferenceCurve::default(),
            PhaseThresholds::default(),
            Duration::from_millis(60),
        );
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let report = generator.run(&collector, stop_rx).await;
            (report, collector.cycles())
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
        stop_tx.send(true).unwrap();

        let (report, cycles) = task.await.unwrap();
        assert_eq!(report.stop, GeneratorStop::Shutdown);
        assert!(!cycles.is_empty());
        let expected: Vec<u64> = (1..=report.last_cycle).collect();
        assert_eq!(cycles, expected);
    }
}
