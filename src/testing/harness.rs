//! Drives a structure with generated operations from a pool of workers.

use super::error::{HarnessError, ValidationError};
use super::generator::OpGenerator;
use super::monitor::{EventMonitor, MonitorConfig};
use super::operation::{Apply, Operation, OperatorKind, SetOperator};
use super::oracle::{braced, Oracle, SequentialSet};
use crate::adt::{Set, Snapshot};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt::Debug;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

pub const DEFAULT_THREAD_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    pub threads: usize,
    /// Settings for monitors built through [`HarnessConfig::monitor`].
    pub monitor: MonitorConfig,
}

impl HarnessConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// A fresh monitor using these settings.
    pub fn monitor<O: Operation>(&self) -> EventMonitor<O> {
        EventMonitor::with_config(self.monitor)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            threads: DEFAULT_THREAD_COUNT,
            monitor: MonitorConfig::default(),
        }
    }
}

/// Outcome of a monitored run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Events validated before the run ended.
    pub events: usize,
    pub elapsed: Duration,
    pub outcome: Result<(), ValidationError>,
    pub oracle_state: String,
    /// Contents of the concurrent structure, captured only on failure.
    pub concurrent_state: Option<String>,
}

impl RunReport {
    pub fn is_valid(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The number of validated events, or the validation failure.
    pub fn into_result(self) -> Result<usize, HarnessError> {
        self.outcome?;
        Ok(self.events)
    }
}

// Stops the monitor even if a worker panics, otherwise the scope would wait
// on the monitor thread forever.
struct FinishOnDrop<'a, O: Operation>(&'a EventMonitor<O>);

impl<'a, O: Operation> Drop for FinishOnDrop<'a, O> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Harness { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `generator` to exhaustion against `structure` while `monitor`
    /// validates the recorded events against `oracle`.
    ///
    /// `structure` must have been built with the same `monitor` attached.
    /// Workers run on a dedicated rayon pool; the monitor gets its own OS
    /// thread since it sleeps while polling.
    pub fn check<K, S, D>(
        &self,
        structure: &mut S,
        generator: &OpGenerator<K>,
        oracle: &mut D,
        monitor: &EventMonitor<K::Operation>,
    ) -> Result<RunReport, HarnessError>
    where
        K: OperatorKind,
        S: Apply<K::Operation> + Snapshot + Sync,
        S::Item: Debug,
        D: Oracle<K::Operation> + Send,
    {
        let pool = self.pool()?;
        let started = Instant::now();

        let validation = thread::scope(|scope| {
            let validator = scope.spawn(|| monitor.run(oracle));
            {
                let _finish = FinishOnDrop(monitor);
                self.drive(&pool, &*structure, generator);
            }
            validator.join().map_err(|_| HarnessError::MonitorPanicked)
        })?;
        let elapsed = started.elapsed();

        let concurrent_state = match &validation {
            Ok(_) => None,
            Err(_) => Some(braced(structure.snapshot())),
        };
        let report = RunReport {
            events: monitor.processed(),
            elapsed,
            outcome: validation.map(|_| ()),
            oracle_state: oracle.dump(),
            concurrent_state,
        };

        info!(
            threads = self.config.threads,
            seed = generator.seed(),
            target = generator.target_op_count(),
            events = report.events,
            elapsed_us = report.elapsed.as_micros() as u64,
            valid = report.is_valid(),
            "checked run"
        );
        Ok(report)
    }

    /// Run `generator` to exhaustion against an unmonitored `structure` and
    /// report the wall-clock time.
    pub fn throughput<K, S>(
        &self,
        structure: &S,
        generator: &OpGenerator<K>,
    ) -> Result<Duration, HarnessError>
    where
        K: OperatorKind,
        S: Apply<K::Operation> + Sync,
    {
        let pool = self.pool()?;
        let started = Instant::now();
        self.drive(&pool, structure, generator);
        let elapsed = started.elapsed();

        info!(
            threads = self.config.threads,
            operations = generator.generated(),
            elapsed_us = elapsed.as_micros() as u64,
            "throughput run"
        );
        Ok(elapsed)
    }

    fn pool(&self) -> Result<ThreadPool, HarnessError> {
        Ok(ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|index| format!("listcurrent-worker-{}", index))
            .build()?)
    }

    fn drive<K, S>(&self, pool: &ThreadPool, structure: &S, generator: &OpGenerator<K>)
    where
        K: OperatorKind,
        S: Apply<K::Operation> + Sync,
    {
        pool.scope(|workers| {
            for _ in 0..self.config.threads {
                workers.spawn(move |_| {
                    while let Some(operation) = generator.next() {
                        structure.apply(&operation);
                    }
                });
            }
        });
    }
}

/// Replay `generator` single-threaded against `structure` and a fresh
/// oracle, then compare membership of every value the generator can draw.
pub fn final_state_matches<S>(structure: &S, generator: &OpGenerator<SetOperator>) -> bool
where
    S: Set<i64>,
{
    let mut oracle = SequentialSet::new();
    for operation in generator {
        Apply::apply(structure, &operation);
        Oracle::apply(&mut oracle, &operation);
    }
    (0..generator.argument_modulo()).all(|value| structure.contains(&value) == oracle.contains(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::generator::DEFAULT_SET_WEIGHTS;
    use crate::testing::operation::SetOp;
    use crate::testing::recorder::Recorder;
    use std::sync::{Arc, Mutex};

    /// Forgets every value after adding it, so replays diverge quickly.
    struct ForgetfulSet {
        recorder: Recorder<SetOp<i64>>,
        lock: Mutex<()>,
    }

    impl Set<i64> for ForgetfulSet {
        fn add(&self, value: i64) -> bool {
            let _guard = self.lock.lock().unwrap();
            self.recorder.record(|| SetOp::Add(value), true);
            true
        }

        fn remove(&self, value: &i64) -> bool {
            let _guard = self.lock.lock().unwrap();
            self.recorder.record(|| SetOp::Remove(*value), false);
            false
        }

        fn contains(&self, value: &i64) -> bool {
            let _guard = self.lock.lock().unwrap();
            self.recorder.record(|| SetOp::Contains(*value), false);
            false
        }
    }

    impl Snapshot for ForgetfulSet {
        type Item = i64;

        fn snapshot(&mut self) -> Vec<i64> {
            Vec::new()
        }
    }

    fn quick() -> HarnessConfig {
        HarnessConfig::default().with_monitor(
            MonitorConfig::default()
                .with_poll_interval(Duration::from_micros(10))
                .with_completion_timeout(Duration::from_millis(200)),
        )
    }

    #[test]
    fn test_divergence_is_reported() {
        let harness = Harness::new(quick());
        let monitor = Arc::new(harness.config().monitor());
        let mut set = ForgetfulSet {
            recorder: Recorder::new(monitor.clone()),
            lock: Mutex::new(()),
        };
        let generator = OpGenerator::with_weights(&DEFAULT_SET_WEIGHTS).unwrap();
        let mut oracle = SequentialSet::new();

        let report = harness
            .check(&mut set, &generator, &mut oracle, &monitor)
            .unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.concurrent_state.as_deref(), Some("{}"));
        assert!(matches!(
            report.into_result(),
            Err(HarnessError::Validation(ValidationError::Divergence { .. }))
        ));
    }

    #[test]
    fn test_throughput_exhausts_generator() {
        let harness = Harness::new(HarnessConfig::default().with_threads(2));
        let set = ForgetfulSet {
            recorder: Recorder::detached(),
            lock: Mutex::new(()),
        };
        let generator = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 1000, 16, 5).unwrap();

        harness.throughput(&set, &generator).unwrap();
        assert_eq!(generator.generated(), 1000);
        assert!(generator.next().is_none());
    }

    #[test]
    fn test_final_state_detects_forgetful_set() {
        let set = ForgetfulSet {
            recorder: Recorder::detached(),
            lock: Mutex::new(()),
        };
        let weights = [(SetOperator::Add, 1)];
        let generator = OpGenerator::new(&weights, 10, 4, 0).unwrap();
        assert!(!final_state_matches(&set, &generator));
    }
}
