use super::utils::{Key, LockedList, Window};
use crate::adt::{Element, Set, Snapshot};
use crate::testing::{EventMonitor, Recorder, SetOp};
use std::sync::Arc;

/// A sorted list locked hand over hand.
///
/// A traversal holds at most two adjacent node locks and always takes the
/// next lock before dropping the previous one, so no thread can overtake
/// another and nodes are only ever locked left to right. Events are recorded
/// while the final window is still locked.
pub struct FineSet<T: Element + Ord> {
    list: LockedList<T>,
    recorder: Recorder<SetOp<T>>,
}

impl<T: Element + Ord> FineSet<T> {
    pub fn new() -> Self {
        FineSet {
            list: LockedList::new(),
            recorder: Recorder::detached(),
        }
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<SetOp<T>>>) -> Self {
        FineSet {
            list: LockedList::new(),
            recorder: Recorder::new(monitor),
        }
    }

    /// Walk to the window with `pred < value <= curr`, holding both locks.
    fn locate(&self, value: &T) -> Window<'_, T> {
        let mut window = self.list.first_window();
        while window.curr.key.is_below(value) {
            window = window.advance();
        }
        window
    }
}

impl<T: Element + Ord> Set<T> for FineSet<T> {
    fn add(&self, value: T) -> bool {
        let window = self.locate(&value);
        if window.curr.key.matches(&value) {
            self.recorder.record(|| SetOp::Add(value.clone()), false);
            return false;
        }
        self.recorder.record(|| SetOp::Add(value.clone()), true);
        window.insert(Key::Value(value));
        true
    }

    fn remove(&self, value: &T) -> bool {
        let window = self.locate(value);
        let found = window.curr.key.matches(value);
        self.recorder.record(|| SetOp::Remove(value.clone()), found);
        if !found {
            return false;
        }

        let victim = window.unlink();
        drop(window);
        // Reaching a node requires its predecessor's lock, which was held
        // until the unlink, so nobody else can hold or wait on the victim.
        unsafe { LockedList::free(victim) };
        true
    }

    fn contains(&self, value: &T) -> bool {
        let window = self.locate(value);
        let found = window.curr.key.matches(value);
        self.recorder.record(|| SetOp::Contains(value.clone()), found);
        found
    }
}

impl<T: Element + Ord> Snapshot for FineSet<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        self.list.values()
    }
}

impl<T: Element + Ord> Default for FineSet<T> {
    fn default() -> Self {
        FineSet::new()
    }
}
