use super::utils::{Key, LockedList, Window};
use crate::adt::{Element, Set, Snapshot};
use crate::testing::{EventMonitor, Recorder, SetOp};
use std::ptr;
use std::sync::Arc;

/// A sorted list with logical deletion.
///
/// Removal marks a node before unlinking it, so a locked window can be
/// validated locally (both ends unmarked and still adjacent) instead of by
/// re-walking the list, and `contains` needs no locks at all: a value is
/// present iff its node is reachable and unmarked.
pub struct LazySet<T: Element + Ord> {
    list: LockedList<T>,
    recorder: Recorder<SetOp<T>>,
}

impl<T: Element + Ord> LazySet<T> {
    pub fn new() -> Self {
        LazySet {
            list: LockedList::new(),
            recorder: Recorder::detached(),
        }
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<SetOp<T>>>) -> Self {
        LazySet {
            list: LockedList::new(),
            recorder: Recorder::new(monitor),
        }
    }

    /// A locked window with `pred < value <= curr`, neither end marked and
    /// `pred` pointing at `curr`.
    fn locate(&self, value: &T) -> Window<'_, T> {
        loop {
            let mut pred = self.list.head();
            let mut curr = unsafe { &*pred.next() };
            while curr.key.is_below(value) {
                pred = curr;
                curr = unsafe { &*curr.next() };
            }

            let window = Window::lock(pred, curr);
            if !pred.is_marked() && !curr.is_marked() && ptr::eq(pred.next(), curr) {
                return window;
            }
        }
    }

    fn search(&self, value: &T) -> bool {
        let mut curr = self.list.head();
        while curr.key.is_below(value) {
            curr = unsafe { &*curr.next() };
        }
        curr.key.matches(value) && !curr.is_marked()
    }
}

impl<T: Element + Ord> Set<T> for LazySet<T> {
    fn add(&self, value: T) -> bool {
        let window = self.locate(&value);
        if window.curr.key.matches(&value) {
            self.recorder.record(|| SetOp::Add(value.clone()), false);
            return false;
        }

        // Lock-free readers may observe the new node as soon as it is
        // linked, so linking and recording happen as one step.
        self.recorder.linearize(
            || window.insert(Key::Value(value)).key.value(),
            |inserted| (SetOp::Add((*inserted).clone()), true),
        );
        true
    }

    fn remove(&self, value: &T) -> bool {
        let window = self.locate(value);
        if !window.curr.key.matches(value) {
            self.recorder.record(|| SetOp::Remove(value.clone()), false);
            return false;
        }

        let unlinked = self.recorder.linearize(
            || {
                window.curr.mark();
                Some(window.unlink())
            },
            |_| (SetOp::Remove(value.clone()), true),
        );
        if let Some(victim) = unlinked {
            self.list.retire(victim);
        }
        true
    }

    fn contains(&self, value: &T) -> bool {
        self.recorder
            .linearize(
                || Some(self.search(value)),
                |&found| (SetOp::Contains(value.clone()), found),
            )
            .unwrap_or(false)
    }
}

impl<T: Element + Ord> Snapshot for LazySet<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        self.list.values()
    }
}

impl<T: Element + Ord> Default for LazySet<T> {
    fn default() -> Self {
        LazySet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::checks::assert_linearizable;
    use crate::testing::{final_state_matches, OpGenerator, SequentialSet, DEFAULT_SET_WEIGHTS};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sequential_scenario() {
        let set = LazySet::new();
        assert!(set.add(4));
        assert!(!set.add(4));
        assert!(set.contains(&4));
        assert!(set.remove(&4));
        assert!(!set.remove(&4));
        assert!(!set.contains(&4));
    }

    #[test]
    fn test_marked_node_is_absent() {
        let set = LazySet::new();
        set.add(7);
        let node = unsafe { &*set.list.head().next() };
        assert!(set.contains(&7));

        node.mark();
        assert!(!set.contains(&7));
    }

    #[test]
    fn test_concurrent_duplicate_add_succeeds_once() {
        let set = LazySet::new();
        let successes = AtomicUsize::new(0);

        crossbeam::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    if set.add(5) {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(successes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_readers_run_beside_writers() {
        let mut set = LazySet::new();
        for value in 0..64i64 {
            set.add(value * 2);
        }

        crossbeam::thread::scope(|s| {
            s.spawn(|_| {
                for round in 0..200 {
                    for value in 0..64i64 {
                        // Even values are never removed
                        assert!(set.contains(&(value * 2)), "round {}", round);
                    }
                }
            });
            s.spawn(|_| {
                for _ in 0..200 {
                    for value in 0..64i64 {
                        set.add(value * 2 + 1);
                        set.remove(&(value * 2 + 1));
                    }
                }
            });
        })
        .unwrap();

        assert_eq!(set.snapshot().len(), 64);
    }

    #[test]
    fn test_final_state_matches_oracle() {
        let set = LazySet::new();
        let generator = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 1000, 64, 42).unwrap();
        assert!(final_state_matches(&set, &generator));
    }

    #[test]
    fn test_linearizable() {
        assert_linearizable(
            LazySet::with_monitor,
            &DEFAULT_SET_WEIGHTS,
            SequentialSet::new(),
            5000,
            32,
            4,
        );
    }
}
