use crate::adt::{Element, Snapshot, Stack};
use crate::memory::HPBRManager;
use crate::testing::{EventMonitor, Recorder, StackOp, StackOutcome};
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

const RETIRE_THRESHOLD: usize = 100;
const TOP: usize = 0;

struct Node<T> {
    // Moved out by the popping thread; the node itself is freed later
    value: ManuallyDrop<T>,
    next: *mut Node<T>,
    /// Number of nodes from here to the bottom, this one included.
    depth: usize,
}

unsafe impl<T: Send> Send for Node<T> {}

impl<T> Node<T> {
    fn new_as_pointer(value: T) -> *mut Self {
        Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: ptr::null_mut(),
            depth: 1,
        }))
    }
}

/// Treiber's lock-free stack.
///
/// Push and pop retry a CAS on `top` until it succeeds. Every node carries
/// its depth, so `size` is a single protected read of the top node. Popped
/// nodes are reclaimed through hazard pointers, which also rules out ABA on
/// `top`.
pub struct TreiberStack<T: Element + PartialEq> {
    top: AtomicPtr<Node<T>>,
    manager: HPBRManager<Node<T>>,
    recorder: Recorder<StackOp<T>>,
}

impl<T: Element + PartialEq> TreiberStack<T> {
    pub fn new() -> Self {
        TreiberStack::with_recorder(Recorder::detached())
    }

    pub fn with_monitor(monitor: Arc<EventMonitor<StackOp<T>>>) -> Self {
        TreiberStack::with_recorder(Recorder::new(monitor))
    }

    fn with_recorder(recorder: Recorder<StackOp<T>>) -> Self {
        TreiberStack {
            top: AtomicPtr::default(),
            manager: HPBRManager::new(RETIRE_THRESHOLD, 1),
            recorder,
        }
    }

    /// Load and protect the current top. `None` means `top` moved before the
    /// hazard was published.
    fn protected_top(&self) -> Option<*mut Node<T>> {
        let top = self.top.load(Ordering::Acquire);
        if top.is_null() {
            return Some(top);
        }
        self.manager.protect(top, TOP);
        if self.top.load(Ordering::Acquire) == top {
            Some(top)
        } else {
            None
        }
    }
}

impl<T: Element + PartialEq> Stack<T> for TreiberStack<T> {
    fn push(&self, value: T) -> bool {
        let node = Node::new_as_pointer(value);
        // Only read when describing the event, before any pop can take it
        let value_ptr: *const T = unsafe { &*(*node).value };

        loop {
            let top = match self.protected_top() {
                Some(top) => top,
                None => continue,
            };
            unsafe {
                (*node).next = top;
                (*node).depth = if top.is_null() { 1 } else { (*top).depth + 1 };
            }

            let pushed = self.recorder.linearize(
                || {
                    self.top
                        .compare_exchange_weak(top, node, Ordering::AcqRel, Ordering::Acquire)
                        .ok()
                },
                |_| {
                    let value = unsafe { (*value_ptr).clone() };
                    (StackOp::Push(value), StackOutcome::Pushed(true))
                },
            );
            if pushed.is_some() {
                break;
            }
        }

        self.manager.clear();
        true
    }

    fn pop(&self) -> Option<T> {
        let popped = loop {
            let top = match self.protected_top() {
                Some(top) => top,
                None => continue,
            };

            if top.is_null() {
                let empty = self.recorder.linearize(
                    || self.top.load(Ordering::Acquire).is_null().then_some(()),
                    |_| (StackOp::Pop, StackOutcome::Popped(None)),
                );
                if empty.is_some() {
                    break None;
                }
                continue;
            }

            let next = unsafe { (*top).next };
            let taken = self.recorder.linearize(
                || {
                    self.top
                        .compare_exchange_weak(top, next, Ordering::AcqRel, Ordering::Acquire)
                        .ok()
                        .map(|_| unsafe { ManuallyDrop::into_inner(ptr::read(&(*top).value)) })
                },
                |value: &T| (StackOp::Pop, StackOutcome::Popped(Some(value.clone()))),
            );
            if let Some(value) = taken {
                self.manager.retire(top);
                break Some(value);
            }
        };

        self.manager.clear();
        popped
    }

    fn size(&self) -> usize {
        let size = loop {
            let top = match self.protected_top() {
                Some(top) => top,
                None => continue,
            };

            let observed = self.recorder.linearize(
                || {
                    if self.top.load(Ordering::Acquire) != top {
                        None
                    } else if top.is_null() {
                        Some(0)
                    } else {
                        Some(unsafe { (*top).depth })
                    }
                },
                |&size| (StackOp::Size, StackOutcome::Size(size)),
            );
            if let Some(size) = observed {
                break size;
            }
        };

        self.manager.clear();
        size
    }
}

impl<T: Element + PartialEq> Snapshot for TreiberStack<T> {
    type Item = T;

    fn snapshot(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        let mut current = *self.top.get_mut();
        while !current.is_null() {
            let node = unsafe { &*current };
            values.push(T::clone(&node.value));
            current = node.next;
        }
        values
    }
}

impl<T: Element + PartialEq> Default for TreiberStack<T> {
    fn default() -> Self {
        TreiberStack::new()
    }
}

impl<T: Element + PartialEq> Drop for TreiberStack<T> {
    // Values of retired nodes were moved out by their poppers; only the nodes
    // still on the stack own a value.
    fn drop(&mut self) {
        let mut current = *self.top.get_mut();
        while !current.is_null() {
            let mut node = unsafe { Box::from_raw(current) };
            unsafe { ManuallyDrop::drop(&mut node.value) };
            current = node.next;
        }
    }
}
