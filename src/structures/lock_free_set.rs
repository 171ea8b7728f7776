use super::utils::{AtomicMarkablePtr, Key};
use crate::adt::{Element, Set, Snapshot};
use crate::memory::HPBRManager;
use crate::testing::{EventMonitor, Recorder, SetOp};
use std::ptr;
use std::sync::Arc;

// Hazard slots
const PRED: usize = 0;
const CURR: usize = 1;
const SUCC: usize = 2;
const HAZARDS: usize = 3;

const RETIRE_THRESHOLD: usize = 64;

struct Node<T> {
    key: Key<T>,
    /// Successor, with the mark bit flagging this node as removed.
    next: AtomicMarkablePtr<Node<T>>,
}

impl<T> Node<T> {
    fn new_as_pointer(key: Key<T>, next: *mut Node<T>) -> *mut Self {
        Box::into_raw(Box::new(Node {
            key,
            next: AtomicMarkablePtr::new(next, false),
        }))
    }
}

/// A lock-free sorted list.
///
/// Removal first sets the mark bit in the victim's own `next` pointer, which
/// is the moment the value leaves the set, and then tries to swing the
/// predecessor past it. Any traversal that meets a marked node finishes the
/// unlink on the remover's behalf. Nodes are reclaimed through hazard
/// pointers, and only by the thread whose unlinking CAS succeeded.
pub struct LockFreeSet<T: Element + Ord> {
    head: *mut Node<T>,
    manager: HPBRManager<Node<T>>,
    recorder: Recorder<SetOp<T>>,
}

unsafe impl<T: Element + Ord> Send for LockFreeSet<T> {}
unsafe impl<T: Element + Ord> Sync for LockFreeSet<T> {}

impl<T: Element + Ord> LockFreeSet<T> {
    pub fn new() -> Self {
        LockFreeSet::with_recorder(Recorder::detached())
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<SetOp<T>>>) -> Self {
        LockFreeSet::with_recorder(Recorder::new(monitor))
    }

    fn with_recorder(recorder: Recorder<SetOp<T>>) -> Self {
        let tail = Node::new_as_pointer(Key::Max, ptr::null_mut());
        LockFreeSet {
            head: Node::new_as_pointer(Key::Min, tail),
            manager: HPBRManager::new(RETIRE_THRESHOLD, HAZARDS),
            recorder,
        }
    }

    /// Find the window `(pred, curr)` where `curr` is the first unmarked node
    /// not `is_below` the target, unlinking marked nodes on the way.
    ///
    /// On return both nodes are protected by this thread's hazard slots, and
    /// `pred` pointed at `curr` with neither marked at some instant during
    /// the call.
    fn find<F>(&self, is_below: F) -> (*mut Node<T>, *mut Node<T>)
    where
        F: Fn(&Key<T>) -> bool,
    {
        'retry: loop {
            // The head is never retired and needs no protection
            let mut pred = self.head;
            let mut curr = unsafe { &*pred }.next.get_ptr();
            self.manager.protect(curr, CURR);
            if unsafe { &*pred }.next.load() != (curr, false) {
                continue 'retry;
            }

            loop {
                let pred_ref = unsafe { &*pred };
                let curr_ref = unsafe { &*curr };
                let (succ, marked) = curr_ref.next.load();
                self.manager.protect(succ, SUCC);
                if curr_ref.next.load() != (succ, marked) || pred_ref.next.load() != (curr, false)
                {
                    continue 'retry;
                }

                if marked {
                    if pred_ref.next.compare_exchange(curr, succ, false, false).is_err() {
                        continue 'retry;
                    }
                    self.manager.retire(curr);
                } else {
                    if !is_below(&curr_ref.key) {
                        return (pred, curr);
                    }
                    pred = curr;
                    self.manager.protect(pred, PRED);
                }
                curr = succ;
                self.manager.protect(curr, CURR);
            }
        }
    }

    fn search(&self, value: &T) -> bool {
        let (_, curr) = self.find(|key| key.is_below(value));
        let curr = unsafe { &*curr };
        curr.key.matches(value) && !curr.next.is_marked()
    }
}

impl<T: Element + Ord> Set<T> for LockFreeSet<T> {
    fn add(&self, value: T) -> bool {
        let node = Node::new_as_pointer(Key::Value(value), ptr::null_mut());
        let new = unsafe { &*node };
        // Taken while the node is still private; only dereferenced for
        // events, which are described before any remover can mark the node.
        let new_value = new.key.value();

        let added = loop {
            let (pred, curr) = self.find(|key| *key < new.key);
            let (pred, curr_ref) = unsafe { (&*pred, &*curr) };

            if curr_ref.key == new.key {
                let present = self.recorder.linearize(
                    || {
                        if curr_ref.next.is_marked() {
                            None
                        } else {
                            new_value
                        }
                    },
                    |value| (SetOp::Add((*value).clone()), false),
                );
                if present.is_some() {
                    unsafe { drop(Box::from_raw(node)) };
                    break false;
                }
                continue;
            }

            new.next.store(curr, false);
            let linked = self.recorder.linearize(
                || {
                    pred.next
                        .compare_exchange(curr, node, false, false)
                        .ok()
                        .and(new_value)
                },
                |value| (SetOp::Add((*value).clone()), true),
            );
            if linked.is_some() {
                break true;
            }
        };

        self.manager.clear();
        added
    }

    fn remove(&self, value: &T) -> bool {
        let removed = loop {
            let (pred, curr) = self.find(|key| key.is_below(value));
            let (pred_ref, curr_ref) = unsafe { (&*pred, &*curr) };

            if !curr_ref.key.matches(value) {
                // Absent as long as the window is still intact
                let absent = self.recorder.linearize(
                    || {
                        if pred_ref.next.load() == (curr, false) {
                            Some(())
                        } else {
                            None
                        }
                    },
                    |_| (SetOp::Remove(value.clone()), false),
                );
                if absent.is_some() {
                    break false;
                }
                continue;
            }

            let (succ, marked) = curr_ref.next.load();
            if marked {
                continue;
            }
            let marked = self.recorder.linearize(
                || curr_ref.next.compare_and_mark(succ).ok(),
                |_| (SetOp::Remove(value.clone()), true),
            );
            if marked.is_none() {
                continue;
            }

            if pred_ref.next.compare_exchange(curr, succ, false, false).is_ok() {
                self.manager.retire(curr);
            } else {
                // Someone changed pred; let a traversal clean up instead
                self.find(|key| key.is_below(value));
            }
            break true;
        };

        self.manager.clear();
        removed
    }

    fn contains(&self, value: &T) -> bool {
        let found = self
            .recorder
            .linearize(
                || Some(self.search(value)),
                |&found| (SetOp::Contains(value.clone()), found),
            )
            .unwrap_or(false);
        self.manager.clear();
        found
    }
}

impl<T: Element + Ord> Snapshot for LockFreeSet<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        let mut current = self.head;
        while !current.is_null() {
            let node = unsafe { &*current };
            let (next, marked) = node.next.load();
            if let (Some(value), false) = (node.key.value(), marked) {
                values.push(value.clone());
            }
            current = next;
        }
        values
    }
}

impl<T: Element + Ord> Default for LockFreeSet<T> {
    fn default() -> Self {
        LockFreeSet::new()
    }
}

impl<T: Element + Ord> Drop for LockFreeSet<T> {
    // Marked nodes still in the chain were never retired, so the chain and
    // the manager's retired lists are disjoint.
    fn drop(&mut self) {
        let mut current = self.head;
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next.get_ptr();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::checks::assert_linearizable;
    use crate::testing::{final_state_matches, OpGenerator, SequentialSet, DEFAULT_SET_WEIGHTS};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn test_sequential_scenario() {
        let set = LockFreeSet::new();
        assert!(set.add(4));
        assert!(!set.add(4));
        assert!(set.contains(&4));
        assert!(set.remove(&4));
        assert!(!set.remove(&4));
        assert!(!set.contains(&4));
    }

    #[test]
    fn test_two_threads_add_same_value() {
        for _ in 0..100 {
            let mut set = LockFreeSet::new();
            let barrier = Barrier::new(2);
            let successes = AtomicUsize::new(0);

            crossbeam::thread::scope(|s| {
                for _ in 0..2 {
                    s.spawn(|_| {
                        barrier.wait();
                        if set.add(5) {
                            successes.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                }
            })
            .unwrap();

            assert_eq!(successes.load(Ordering::Relaxed), 1);
            assert_eq!(set.snapshot(), vec![5]);
        }
    }

    #[test]
    fn test_traversal_unlinks_marked_nodes() {
        let set = LockFreeSet::new();
        set.add(1);
        set.add(2);
        set.add(3);

        // Logically delete 2 without unlinking it
        let one = unsafe { &*(*set.head).next.get_ptr() };
        let two = unsafe { &*one.next.get_ptr() };
        let three = two.next.get_ptr();
        two.next.compare_and_mark(three).unwrap();

        assert!(!set.contains(&2));
        assert_eq!(one.next.get_ptr(), three);
        assert_eq!(set.manager.retired_len(), 1);
        assert!(set.contains(&3));
    }

    #[test]
    fn test_removed_values_are_freed() {
        let probe = Arc::new(7);
        let set = LockFreeSet::new();
        set.add(probe.clone());
        set.add(Arc::new(8));
        assert_eq!(Arc::strong_count(&probe), 2);

        assert!(set.remove(&probe));
        drop(set);
        assert_eq!(Arc::strong_count(&probe), 1);
    }

    #[test]
    fn test_concurrent_churn() {
        let mut set = LockFreeSet::new();

        crossbeam::thread::scope(|s| {
            for thread in 0..8i64 {
                let set = &set;
                s.spawn(move |_| {
                    for round in 0..2000 {
                        let value = (thread * 7 + round) % 32;
                        if !set.add(value) {
                            set.remove(&value);
                        }
                        set.contains(&((value + 1) % 32));
                    }
                });
            }
        })
        .unwrap();

        let values = set.snapshot();
        assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(values.iter().all(|value| (0..32).contains(value)));
    }

    #[test]
    fn test_final_state_matches_oracle() {
        let set = LockFreeSet::new();
        let generator = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 1000, 64, 42).unwrap();
        assert!(final_state_matches(&set, &generator));
    }

    #[test]
    fn test_linearizable() {
        assert_linearizable(
            LockFreeSet::with_monitor,
            &DEFAULT_SET_WEIGHTS,
            SequentialSet::new(),
            5000,
            32,
            6,
        );
    }
}
