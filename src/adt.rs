//! The abstract data types every structure in this crate implements.
//!
//! All operations take `&self` so a single instance can be shared between
//! threads. Logical failures (adding a duplicate, removing something absent,
//! popping an empty stack) are ordinary return values, never errors.

use std::fmt::Debug;

/// Anything the structures can hold. Monitored structures copy values into
/// their event log, hence `Clone` and `Debug`.
pub trait Element: Clone + Debug + Send + Sync + 'static {}

impl<T: Clone + Debug + Send + Sync + 'static> Element for T {}

/// A concurrent set of ordered values.
pub trait Set<T>: Send + Sync {
    /// Insert `value`. Returns `false` if it was already present.
    fn add(&self, value: T) -> bool;

    /// Remove `value`. Returns `false` if it was absent.
    fn remove(&self, value: &T) -> bool;

    fn contains(&self, value: &T) -> bool;
}

/// A concurrent multiset, which may hold the same value many times.
pub trait Multiset<T>: Send + Sync {
    /// Insert one more copy of `value`. Always succeeds.
    fn add(&self, value: T) -> bool;

    /// Remove a single copy of `value`. Returns `false` if there was none.
    fn remove(&self, value: &T) -> bool;

    /// How many copies of `value` are present.
    fn count(&self, value: &T) -> usize;
}

/// A concurrent LIFO stack.
pub trait Stack<T>: Send + Sync {
    /// Push `value` on top. Always succeeds.
    fn push(&self, value: T) -> bool;

    /// Take the top value, or `None` when the stack is empty.
    fn pop(&self) -> Option<T>;

    fn size(&self) -> usize;
}

/// Dump the abstract contents of a structure.
///
/// Taking `&mut self` guarantees no operation is running concurrently, so
/// every variant can walk its nodes without synchronization. Sets and
/// multisets report ascending order, stacks report top first.
pub trait Snapshot {
    type Item;

    fn snapshot(&mut self) -> Vec<Self::Item>;
}
