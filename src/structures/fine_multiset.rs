use super::utils::{Key, LockedList, Window};
use crate::adt::{Element, Multiset, Snapshot};
use crate::testing::{EventMonitor, MultisetOp, Recorder};
use std::sync::Arc;

/// A sorted list with duplicates, locked hand over hand.
///
/// Copies of a value sit next to each other. Insertion and removal both
/// happen right behind the last smaller node, so once a counter holds that
/// node no other operation on the value can get ahead of it.
pub struct FineMultiset<T: Element + Ord> {
    list: LockedList<T>,
    recorder: Recorder<MultisetOp<T>>,
}

impl<T: Element + Ord> FineMultiset<T> {
    pub fn new() -> Self {
        FineMultiset {
            list: LockedList::new(),
            recorder: Recorder::detached(),
        }
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<MultisetOp<T>>>) -> Self {
        FineMultiset {
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

impl<T: Element + Ord> Multiset<T> for FineMultiset<T> {
    fn add(&self, value: T) -> bool {
        let window = self.locate(&value);
        self.recorder.record(|| MultisetOp::Add(value.clone()), 1);
        window.insert(Key::Value(value));
        true
    }

    fn remove(&self, value: &T) -> bool {
        let window = self.locate(value);
        let found = window.curr.key.matches(value);
        self.recorder
            .record(|| MultisetOp::Remove(value.clone()), found as usize);
        if !found {
            return false;
        }

        let victim = window.unlink();
        drop(window);
        unsafe { LockedList::free(victim) };
        true
    }

    fn count(&self, value: &T) -> usize {
        let mut window = self.locate(value);
        // The count is fixed the moment `pred` is held, but only known after
        // walking the run of copies.
        let handle = self.recorder.reserve(|| MultisetOp::Count(value.clone()));

        let mut count = 0;
        while window.curr.key.matches(value) {
            count += 1;
            window = window.advance();
        }
        drop(window);

        handle.complete(count);
        count
    }
}

impl<T: Element + Ord> Snapshot for FineMultiset<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        self.list.values()
    }
}

impl<T: Element + Ord> Default for FineMultiset<T> {
    fn default() -> Self {
        FineMultiset::new()
    }
}
