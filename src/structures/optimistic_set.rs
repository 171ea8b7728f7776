use super::utils::{Key, LockedList, LockedNode, Window};
use crate::adt::{Element, Set, Snapshot};
use crate::testing::{EventMonitor, Recorder, SetOp};
use std::ptr;
use std::sync::Arc;

/// A sorted list searched without locks.
///
/// Operations traverse unlocked, lock the window they land on and then
/// re-walk from the head to check that the window is still reachable and
/// adjacent. A failed check releases both locks and starts over. Unlinked
/// nodes stay allocated until the set drops, since unlocked traversals may
/// still be standing on them.
pub struct OptimisticSet<T: Element + Ord> {
    list: LockedList<T>,
    recorder: Recorder<SetOp<T>>,
}

impl<T: Element + Ord> OptimisticSet<T> {
    pub fn new() -> Self {
        OptimisticSet {
            list: LockedList::new(),
            recorder: Recorder::detached(),
        }
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<SetOp<T>>>) -> Self {
        OptimisticSet {
            list: LockedList::new(),
            recorder: Recorder::new(monitor),
        }
    }

    fn locate(&self, value: &T) -> Window<'_, T> {
        loop {
            let mut pred = self.list.head();
            let mut curr = unsafe { &*pred.next() };
            while curr.key.is_below(value) {
                pred = curr;
                curr = unsafe { &*curr.next() };
            }

            let window = Window::lock(pred, curr);
            if self.validate(window.pred, window.curr) {
                return window;
            }
        }
    }

    /// `pred` is reachable from the head and still points at `curr`.
    fn validate(&self, pred: &LockedNode<T>, curr: &LockedNode<T>) -> bool {
        let mut node = self.list.head();
        while node.key <= pred.key {
            if ptr::eq(node, pred) {
                return ptr::eq(node.next(), curr);
            }
            node = unsafe { &*node.next() };
        }
        false
    }
}

impl<T: Element + Ord> Set<T> for OptimisticSet<T> {
    fn add(&self, value: T) -> bool {
        let window = self.locate(&value);
        let added = !window.curr.key.matches(&value);
        self.recorder.record(|| SetOp::Add(value.clone()), added);
        if added {
            window.insert(Key::Value(value));
        }
        added
    }

    fn remove(&self, value: &T) -> bool {
        let window = self.locate(value);
        let found = window.curr.key.matches(value);
        self.recorder.record(|| SetOp::Remove(value.clone()), found);
        if found {
            self.list.retire(window.unlink());
        }
        found
    }

    fn contains(&self, value: &T) -> bool {
        let window = self.locate(value);
        let found = window.curr.key.matches(value);
        self.recorder.record(|| SetOp::Contains(value.clone()), found);
        found
    }
}

impl<T: Element + Ord> Snapshot for OptimisticSet<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        self.list.values()
    }
}

impl<T: Element + Ord> Default for OptimisticSet<T> {
    fn default() -> Self {
        OptimisticSet::new()
    }
}
