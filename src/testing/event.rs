use super::operation::Operation;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// An operation together with the result the concurrent structure observed.
///
/// An event may be appended to the monitor's sequence while still incomplete
/// and receive its output later through an [`EventHandle`]. This lets an
/// operation claim its place in the global order at its linearization point
/// before its result is known.
pub struct Event<O: Operation> {
    operation: O,
    output: OnceLock<O::Output>,
}

impl<O: Operation> Event<O> {
    pub fn completed(operation: O, output: O::Output) -> Self {
        Event {
            operation,
            output: OnceLock::from(output),
        }
    }

    pub fn incomplete(operation: O) -> Self {
        Event {
            operation,
            output: OnceLock::new(),
        }
    }

    pub fn operation(&self) -> &O {
        &self.operation
    }

    pub fn output(&self) -> Option<&O::Output> {
        self.output.get()
    }

    pub fn is_complete(&self) -> bool {
        self.output.get().is_some()
    }

    /// Returns `false` if the event already had an output.
    fn complete(&self, output: O::Output) -> bool {
        self.output.set(output).is_ok()
    }
}

impl<O: Operation> fmt::Display for Event<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.output() {
            Some(output) => write!(f, "{} -> {:?}", self.operation, output),
            None => write!(f, "{} -> ?", self.operation),
        }
    }
}

impl<O: Operation> fmt::Debug for Event<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Event({})", self)
    }
}

/// Handle to a reserved event, used to fill in its output once known.
///
/// A detached handle (returned when nothing is monitoring) ignores the
/// completion.
#[must_use = "a reserved event blocks validation until it is completed"]
pub struct EventHandle<O: Operation> {
    event: Option<Arc<Event<O>>>,
}

impl<O: Operation> EventHandle<O> {
    pub(crate) fn new(event: Arc<Event<O>>) -> Self {
        EventHandle { event: Some(event) }
    }

    pub fn detached() -> Self {
        EventHandle { event: None }
    }

    pub fn complete(self, output: O::Output) {
        if let Some(event) = self.event {
            let fresh = event.complete(output);
            debug_assert!(fresh, "event completed twice");
        }
    }
}

impl<O: Operation> fmt::Debug for EventHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.event {
            Some(event) => write!(f, "EventHandle({})", event),
            None => write!(f, "EventHandle(detached)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::operation::SetOp;

    #[test]
    fn test_handle_completes_shared_event() {
        let event = Arc::new(Event::incomplete(SetOp::Add(3)));
        assert!(!event.is_complete());
        assert_eq!(event.to_string(), "add(3) -> ?");

        EventHandle::new(event.clone()).complete(true);
        assert_eq!(event.output(), Some(&true));
        assert_eq!(event.to_string(), "add(3) -> true");
    }

    #[test]
    fn test_detached_handle_is_inert() {
        EventHandle::<SetOp<i64>>::detached().complete(false);
    }
}
