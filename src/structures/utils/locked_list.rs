use super::Key;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A list node guarded by its own lock.
///
/// The successor link is atomic so that optimistic and lazy traversals may
/// read it without the lock; writers still only change it while holding the
/// lock of this node.
pub struct LockedNode<T> {
    pub key: Key<T>,
    next: AtomicPtr<LockedNode<T>>,
    marked: AtomicBool,
    lock: Mutex<()>,
}

impl<T> LockedNode<T> {
    pub fn new_as_pointer(key: Key<T>, next: *mut Self) -> *mut Self {
        Box::into_raw(Box::new(LockedNode {
            key,
            next: AtomicPtr::new(next),
            marked: AtomicBool::new(false),
            lock: Mutex::new(()),
        }))
    }

    /// The guarded data is `()`, so a poisoned lock carries no broken state.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next(&self) -> *mut Self {
        self.next.load(Ordering::Acquire)
    }

    pub fn set_next(&self, next: *mut Self) {
        self.next.store(next, Ordering::Release);
    }

    pub fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    pub fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }
}

/// A locked `(pred, curr)` pair of adjacent nodes.
///
/// Both locks are released, pred first, when the window drops.
pub struct Window<'a, T> {
    pub pred: &'a LockedNode<T>,
    pub curr: &'a LockedNode<T>,
    _pred_guard: MutexGuard<'a, ()>,
    curr_guard: MutexGuard<'a, ()>,
}

impl<'a, T> Window<'a, T> {
    /// Lock `pred`, then `curr`.
    pub fn lock(pred: &'a LockedNode<T>, curr: &'a LockedNode<T>) -> Self {
        let pred_guard = pred.lock();
        let curr_guard = curr.lock();
        Window {
            pred,
            curr,
            _pred_guard: pred_guard,
            curr_guard,
        }
    }

    /// Lock the successor of `curr`, then release `pred`.
    ///
    /// Must not be called on a window whose `curr` is the tail.
    pub fn advance(self) -> Self {
        let next = unsafe { &*self.curr.next() };
        let next_guard = next.lock();
        Window {
            pred: self.curr,
            curr: next,
            _pred_guard: self.curr_guard,
            curr_guard: next_guard,
        }
    }

    /// Splice a new node between `pred` and `curr`.
    pub fn insert(&self, key: Key<T>) -> &'a LockedNode<T> {
        let node = LockedNode::new_as_pointer(key, self.pred.next());
        self.pred.set_next(node);
        unsafe { &*node }
    }

    /// Unlink `curr` and hand it back to be freed or retired.
    pub fn unlink(&self) -> *mut LockedNode<T> {
        let victim = self.pred.next();
        self.pred.set_next(self.curr.next());
        victim
    }
}

/// Sentinel-bracketed sorted chain of [`LockedNode`]s shared by the lock
/// based lists.
///
/// Nodes unlinked while unsynchronized readers may still hold them are parked
/// with [`retire`](LockedList::retire) and only freed when the list drops.
pub struct LockedList<T> {
    head: *mut LockedNode<T>,
    retired: Mutex<Vec<*mut LockedNode<T>>>,
}

unsafe impl<T: Send> Send for LockedList<T> {}
unsafe impl<T: Send + Sync> Sync for LockedList<T> {}

impl<T> LockedList<T> {
    pub fn new() -> Self {
        let tail = LockedNode::new_as_pointer(Key::Max, ptr::null_mut());
        LockedList {
            head: LockedNode::new_as_pointer(Key::Min, tail),
            retired: Mutex::new(Vec::new()),
        }
    }

    pub fn head(&self) -> &LockedNode<T> {
        unsafe { &*self.head }
    }

    /// Lock the head and its successor.
    ///
    /// The successor is read only once the head is locked. Read earlier, it
    /// may be a node that a window at the head is unlinking and freeing.
    pub fn first_window(&self) -> Window<'_, T> {
        let head = self.head();
        let head_guard = head.lock();
        let curr = unsafe { &*head.next() };
        let curr_guard = curr.lock();
        Window {
            pred: head,
            curr,
            _pred_guard: head_guard,
            curr_guard,
        }
    }

    /// Defer freeing an unlinked node until the list is dropped.
    pub fn retire(&self, node: *mut LockedNode<T>) {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(node);
    }

    /// Free an unlinked node immediately.
    ///
    /// Only sound when no other thread can still reach `node`, which holds for
    /// strict hand-over-hand traversals once both window locks are released.
    pub unsafe fn free(node: *mut LockedNode<T>) {
        drop(Box::from_raw(node));
    }

    /// Values of every reachable, unmarked node in list order.
    pub fn values(&mut self) -> Vec<T>
    where
        T: Clone,
    {
        let mut values = Vec::new();
        let mut current = self.head;
        while !current.is_null() {
            let node = unsafe { &*current };
            if let (Some(value), false) = (node.key.value(), node.is_marked()) {
                values.push(value.clone());
            }
            current = node.next();
        }
        values
    }
}

impl<T> Default for LockedList<T> {
    fn default() -> Self {
        LockedList::new()
    }
}

impl<T> Drop for LockedList<T> {
    fn drop(&mut self) {
        let mut current = self.head;
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next();
        }

        let retired = self.retired.get_mut().unwrap_or_else(PoisonError::into_inner);
        for node in retired.drain(..) {
            unsafe { drop(Box::from_raw(node)) };
        }
    }
}
