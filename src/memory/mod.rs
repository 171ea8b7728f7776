//! A module for lock-free memory management.
//!
//! The manager in this module lets lock-free structures unlink nodes while other
//! threads may still be reading them. It ensures that no node is freed while a
//! thread can still access it, and prevents the
//! [ABA problem](https://en.wikipedia.org/wiki/ABA_problem) on recycled addresses.

pub use self::hazardpointers::HPBRManager;

mod hazardpointers;
