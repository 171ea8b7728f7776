//! Concurrent sets, a multiset and a stack, one per synchronization
//! discipline.
//!
//! Every structure can be built detached with `new()` or with an
//! [`EventMonitor`](crate::testing::EventMonitor) attached through
//! `with_monitor`, in which case it reports each operation at its
//! linearization point.

pub use self::coarse_set::CoarseSet;
pub use self::fine_multiset::FineMultiset;
pub use self::fine_set::FineSet;
pub use self::lazy_set::LazySet;
pub use self::lock_free_set::LockFreeSet;
pub use self::optimistic_set::OptimisticSet;
pub use self::stack::TreiberStack;

mod coarse_set;
mod fine_multiset;
mod fine_set;
mod lazy_set;
mod lock_free_set;
mod optimistic_set;
mod stack;
mod utils;
