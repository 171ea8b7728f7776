use super::error::ValidationError;
use super::event::{Event, EventHandle};
use super::operation::Operation;
use super::oracle::Oracle;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const DEQUE_SLEEP_DELAY: Duration = Duration::from_micros(50);
const INCOMPLETE_EVENT_SLEEP_DELAY: Duration = Duration::from_micros(10);
const INCOMPLETE_EVENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing knobs for the [`EventMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Sleep between checks of an incomplete event.
    pub completion_poll: Duration,
    /// How long an incomplete event may block replay before the run fails.
    pub completion_timeout: Duration,
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_completion_poll(mut self, completion_poll: Duration) -> Self {
        self.completion_poll = completion_poll;
        self
    }

    pub fn with_completion_timeout(mut self, completion_timeout: Duration) -> Self {
        self.completion_timeout = completion_timeout;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            poll_interval: DEQUE_SLEEP_DELAY,
            completion_poll: INCOMPLETE_EVENT_SLEEP_DELAY,
            completion_timeout: INCOMPLETE_EVENT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting for events to arrive.
    Recording,
    /// Replaying a swapped-out batch against the oracle.
    Draining,
    /// Done, either after the final drain or after a failure.
    Finished,
}

impl MonitorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => MonitorState::Recording,
            1 => MonitorState::Draining,
            _ => MonitorState::Finished,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            MonitorState::Recording => 0,
            MonitorState::Draining => 1,
            MonitorState::Finished => 2,
        }
    }
}

/// Records operations in one global order and checks that order against a
/// sequential oracle.
///
/// Worker threads append events while the structure under test holds
/// whatever makes the operation take effect: the append *is* the operation's
/// place in the total order. A single thread calls [`run`](EventMonitor::run),
/// which repeatedly swaps the pending queue out and replays it outside the
/// lock, so appending never waits for validation.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use listcurrent::adt::Set;
/// use listcurrent::structures::CoarseSet;
/// use listcurrent::testing::{EventMonitor, SequentialSet, SetOp};
///
/// let monitor: Arc<EventMonitor<SetOp<i64>>> = Arc::new(EventMonitor::new());
/// let set = CoarseSet::with_monitor(monitor.clone());
/// set.add(4);
/// set.add(4);
/// monitor.finish();
///
/// let mut oracle = SequentialSet::new();
/// assert_eq!(monitor.run(&mut oracle), Ok(2));
/// ```
pub struct EventMonitor<O: Operation> {
    pending: Mutex<Vec<Arc<Event<O>>>>,
    state: AtomicU8,
    stop: AtomicBool,
    valid: AtomicBool,
    processed: AtomicUsize,
    config: MonitorConfig,
}

impl<O: Operation> EventMonitor<O> {
    pub fn new() -> Self {
        EventMonitor::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        EventMonitor {
            pending: Mutex::new(Vec::new()),
            state: AtomicU8::new(MonitorState::Recording.as_u8()),
            stop: AtomicBool::new(false),
            valid: AtomicBool::new(true),
            processed: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Append a completed event.
    pub fn record(&self, operation: O, output: O::Output) {
        let mut pending = self.lock_pending();
        if self.accepting() {
            pending.push(Arc::new(Event::completed(operation, output)));
        }
    }

    /// Append an event whose output is not known yet.
    ///
    /// Replay stops at this event until the returned handle is completed.
    pub fn reserve(&self, operation: O) -> EventHandle<O> {
        let event = Arc::new(Event::incomplete(operation));
        let mut pending = self.lock_pending();
        if !self.accepting() {
            return EventHandle::detached();
        }
        pending.push(event.clone());
        EventHandle::new(event)
    }

    /// Run `step` while holding the append lock and record its outcome.
    ///
    /// `step` returns `None` when it did not take effect (for example a lost
    /// CAS) and nothing is recorded. Otherwise `describe` turns the result
    /// into the event that is appended before the lock is released, so no
    /// other recorded step can be ordered between the effect and its event.
    pub fn linearize<R, F, D>(&self, step: F, describe: D) -> Option<R>
    where
        F: FnOnce() -> Option<R>,
        D: FnOnce(&R) -> (O, O::Output),
    {
        let mut pending = self.lock_pending();
        let result = step()?;
        if self.accepting() {
            let (operation, output) = describe(&result);
            pending.push(Arc::new(Event::completed(operation, output)));
        }
        Some(result)
    }

    /// Tell the monitor no more events will arrive. It drains once more and
    /// then returns from [`run`](EventMonitor::run).
    pub fn finish(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Events replayed successfully so far.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Acquire)
    }

    /// Validate events until [`finish`](EventMonitor::finish) is observed.
    ///
    /// Returns the number of validated events. The first divergence or
    /// completion timeout ends the run; it is never retried.
    pub fn run<D: Oracle<O>>(&self, oracle: &mut D) -> Result<usize, ValidationError> {
        loop {
            // Read the flag before swapping, so events appended before
            // `finish` are part of the final drain.
            let stopping = self.stop.load(Ordering::Acquire);
            let batch = mem::take(&mut *self.lock_pending());

            if batch.is_empty() {
                if stopping {
                    break;
                }
                thread::sleep(self.config.poll_interval);
                continue;
            }

            self.set_state(MonitorState::Draining);
            debug!(events = batch.len(), "draining events");
            if let Err(failure) = self.replay(oracle, batch) {
                self.valid.store(false, Ordering::Release);
                self.set_state(MonitorState::Finished);
                error!(error = %failure, "linearizability check failed");
                return Err(failure);
            }

            if stopping {
                break;
            }
            self.set_state(MonitorState::Recording);
        }

        self.set_state(MonitorState::Finished);
        let processed = self.processed();
        info!(events = processed, "successfully validated events");
        Ok(processed)
    }

    fn replay<D: Oracle<O>>(
        &self,
        oracle: &mut D,
        batch: Vec<Arc<Event<O>>>,
    ) -> Result<(), ValidationError> {
        for event in batch {
            let observed = self.await_completion(&event)?;
            let expected = oracle.apply(event.operation());
            if expected != *observed {
                return Err(ValidationError::Divergence {
                    processed: self.processed(),
                    event: event.to_string(),
                    expected: format!("{:?}", expected),
                    oracle_state: oracle.dump(),
                });
            }
            self.processed.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn await_completion<'e>(&self, event: &'e Event<O>) -> Result<&'e O::Output, ValidationError> {
        let started = Instant::now();
        loop {
            if let Some(output) = event.output() {
                return Ok(output);
            }
            if started.elapsed() >= self.config.completion_timeout {
                return Err(ValidationError::IncompleteEvent {
                    processed: self.processed(),
                    event: event.to_string(),
                    waited: self.config.completion_timeout,
                });
            }
            thread::sleep(self.config.completion_poll);
        }
    }

    fn accepting(&self) -> bool {
        self.state() != MonitorState::Finished
    }

    fn set_state(&self, state: MonitorState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Arc<Event<O>>>> {
        // A panicking worker cannot leave the queue half-written
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<O: Operation> Default for EventMonitor<O> {
    fn default() -> Self {
        EventMonitor::new()
    }
}

impl<O: Operation> fmt::Debug for EventMonitor<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventMonitor")
            .field("state", &self.state())
            .field("valid", &self.is_valid())
            .field("processed", &self.processed())
            .field("config", &self.config)
            .finish()
    }
}
