//! Concurrent linked-list sets and a lock-free stack, together with the
//! machinery to check them for linearizability.
//!
//! The [`structures`] module holds one set per synchronization discipline
//! (a single coarse lock, hand-over-hand locking, optimistic validation,
//! lazy logical deletion, and a lock-free list), a fine-grained multiset and
//! a Treiber stack. Each implements the matching trait from [`adt`].
//! Lock-free structures reclaim memory through the hazard pointers in
//! [`memory`].
//!
//! The [`testing`] module drives a structure from many threads with a
//! deterministic random workload while an event monitor replays the
//! observed operations, in the order they took effect, against a
//! sequential oracle.

pub mod adt;
pub mod memory;
pub mod structures;
pub mod testing;
