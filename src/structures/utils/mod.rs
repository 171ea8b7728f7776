pub use self::atomic_markable::AtomicMarkablePtr;
pub use self::key::Key;
pub use self::locked_list::{LockedList, LockedNode, Window};

pub mod atomic_markable;
mod key;
mod locked_list;
