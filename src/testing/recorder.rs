use super::event::EventHandle;
use super::monitor::EventMonitor;
use super::operation::Operation;
use std::fmt;
use std::sync::Arc;

/// The hook a data structure holds to report its operations.
///
/// Detached by default, in which case every call is a no-op and the
/// operation closures are never evaluated, so unmonitored structures pay
/// for one branch per operation.
pub struct Recorder<O: Operation> {
    monitor: Option<Arc<EventMonitor<O>>>,
}

impl<O: Operation> Recorder<O> {
    pub fn detached() -> Self {
        Recorder { monitor: None }
    }

    pub fn new(monitor: Arc<EventMonitor<O>>) -> Self {
        Recorder {
            monitor: Some(monitor),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.monitor.is_some()
    }

    /// Append a completed event. Call while the effect is still exclusive.
    #[inline]
    pub fn record<F: FnOnce() -> O>(&self, operation: F, output: O::Output) {
        if let Some(monitor) = &self.monitor {
            monitor.record(operation(), output);
        }
    }

    /// Claim a slot in the order now and fill in the output later.
    #[inline]
    pub fn reserve<F: FnOnce() -> O>(&self, operation: F) -> EventHandle<O> {
        match &self.monitor {
            Some(monitor) => monitor.reserve(operation()),
            None => EventHandle::detached(),
        }
    }

    /// Run `step` atomically with its event, see [`EventMonitor::linearize`].
    ///
    /// Without a monitor `step` simply runs.
    #[inline]
    pub fn linearize<R, F, D>(&self, step: F, describe: D) -> Option<R>
    where
        F: FnOnce() -> Option<R>,
        D: FnOnce(&R) -> (O, O::Output),
    {
        match &self.monitor {
            Some(monitor) => monitor.linearize(step, describe),
            None => step(),
        }
    }
}

impl<O: Operation> Default for Recorder<O> {
    fn default() -> Self {
        Recorder::detached()
    }
}

impl<O: Operation> Clone for Recorder<O> {
    fn clone(&self) -> Self {
        Recorder {
            monitor: self.monitor.clone(),
        }
    }
}

impl<O: Operation> fmt::Debug for Recorder<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("attached", &self.is_attached())
            .finish()
    }
}
