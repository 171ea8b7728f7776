use crate::adt::{Element, Set, Snapshot};
use crate::testing::{EventMonitor, Recorder, SetOp};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Link<T> = Option<Box<Node<T>>>;

struct Node<T> {
    value: T,
    next: Link<T>,
}

/// A sorted list behind one mutex.
///
/// Every operation holds the lock for its whole duration and records its
/// event before releasing it.
pub struct CoarseSet<T: Element + Ord> {
    head: Mutex<Link<T>>,
    recorder: Recorder<SetOp<T>>,
}

impl<T: Element + Ord> CoarseSet<T> {
    pub fn new() -> Self {
        CoarseSet {
            head: Mutex::new(None),
            recorder: Recorder::detached(),
        }
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<SetOp<T>>>) -> Self {
        CoarseSet {
            head: Mutex::new(None),
            recorder: Recorder::new(monitor),
        }
    }

    // The chain is relinked in single assignments, so a panic mid-operation
    // cannot leave it broken.
    fn lock(&self) -> MutexGuard<'_, Link<T>> {
        self.head.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The first link whose node is not below `value`.
fn seek<'a, T: Ord>(mut link: &'a mut Link<T>, value: &T) -> &'a mut Link<T> {
    while link.as_ref().map_or(false, |node| node.value < *value) {
        if let Some(node) = link {
            link = &mut node.next;
        }
    }
    link
}

impl<T: Element + Ord> Set<T> for CoarseSet<T> {
    fn add(&self, value: T) -> bool {
        let mut head = self.lock();
        let link = seek(&mut head, &value);
        let present = link.as_deref().map_or(false, |node| node.value == value);
        self.recorder.record(|| SetOp::Add(value.clone()), !present);

        if !present {
            let next = link.take();
            *link = Some(Box::new(Node { value, next }));
        }
        !present
    }

    fn remove(&self, value: &T) -> bool {
        let mut head = self.lock();
        let link = seek(&mut head, value);
        let removed = match link.take() {
            Some(node) if node.value == *value => {
                *link = node.next;
                true
            }
            other => {
                *link = other;
                false
            }
        };
        self.recorder.record(|| SetOp::Remove(value.clone()), removed);
        removed
    }

    fn contains(&self, value: &T) -> bool {
        let mut head = self.lock();
        let present = seek(&mut head, value)
            .as_deref()
            .map_or(false, |node| node.value == *value);
        self.recorder.record(|| SetOp::Contains(value.clone()), present);
        present
    }
}

impl<T: Element + Ord> Snapshot for CoarseSet<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        let head = self.head.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut current = head.as_deref();
        while let Some(node) = current {
            values.push(node.value.clone());
            current = node.next.as_deref();
        }
        values
    }
}

impl<T: Element + Ord> Default for CoarseSet<T> {
    fn default() -> Self {
        CoarseSet::new()
    }
}

impl<T: Element + Ord> Drop for CoarseSet<T> {
    // Unlink iteratively; the default recursive drop overflows on long chains
    fn drop(&mut self) {
        let head = self.head.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut link = head.take();
        while let Some(mut node) = link {
            link = node.next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::checks::assert_linearizable;
    use crate::testing::{
        final_state_matches, OpGenerator, SequentialSet, DEFAULT_SET_WEIGHTS,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sequential_scenario() {
        let set = CoarseSet::new();
        assert!(set.add(4));
        assert!(!set.add(4));
        assert!(set.contains(&4));
        assert!(set.remove(&4));
        assert!(!set.remove(&4));
        assert!(!set.contains(&4));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut set = CoarseSet::new();
        for value in &[5, 1, 9, 3, 7, 3] {
            set.add(*value);
        }
        set.remove(&9);
        assert_eq!(set.snapshot(), vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_seek_stops_at_first_link_not_below() {
        let mut head: Link<i64> = None;
        for value in [7, 5, 3] {
            head = Some(Box::new(Node { value, next: head }));
        }

        assert_eq!(seek(&mut head, &5).as_ref().map(|node| node.value), Some(5));
        assert_eq!(seek(&mut head, &6).as_ref().map(|node| node.value), Some(7));
        assert!(seek(&mut head, &8).is_none());
        assert_eq!(seek(&mut head, &i64::MIN).as_ref().map(|node| node.value), Some(3));
    }

    #[test]
    fn test_concurrent_duplicate_add_succeeds_once() {
        let set = CoarseSet::new();
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
        assert!(set.contains(&5));
    }

    #[test]
    fn test_disjoint_writers() {
        let mut set = CoarseSet::new();

        crossbeam::thread::scope(|s| {
            for thread in 0..4i64 {
                let set = &set;
                s.spawn(move |_| {
                    for i in 0..250 {
                        assert!(set.add(thread * 1000 + i));
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(set.snapshot().len(), 1000);
    }

    #[test]
    fn test_final_state_matches_oracle() {
        let set = CoarseSet::new();
        let generator = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 1000, 64, 42).unwrap();
        assert!(final_state_matches(&set, &generator));
    }

    #[test]
    fn test_linearizable() {
        assert_linearizable(
            CoarseSet::with_monitor,
            &DEFAULT_SET_WEIGHTS,
            SequentialSet::new(),
            5000,
            32,
            1,
        );
    }
}
