use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};

// Boxed nodes are at least 2-aligned, so the low bit of their address is free.
const MARK_BIT: usize = 0x1;

fn merge<T>(ptr: *mut T, marked: bool) -> usize {
    ptr as usize | marked as usize
}

fn split<T>(word: usize) -> (*mut T, bool) {
    ((word & !MARK_BIT) as *mut T, word & MARK_BIT != 0)
}

/// An atomic pointer whose lowest bit carries a deletion mark.
///
/// Pointer and mark are read and swapped together as a single word, so a
/// CAS that expects an unmarked pointer fails once the mark is set.
/// The pointee is not owned: dropping the cell never frees it.
pub struct AtomicMarkablePtr<T> {
    ptr: AtomicUsize,
    _phantom: PhantomData<*mut T>,
}

unsafe impl<T: Send> Send for AtomicMarkablePtr<T> {}
unsafe impl<T: Send> Sync for AtomicMarkablePtr<T> {}

impl<T> AtomicMarkablePtr<T> {
    pub fn new(ptr: *mut T, marked: bool) -> Self {
        AtomicMarkablePtr {
            ptr: AtomicUsize::new(merge(ptr, marked)),
            _phantom: PhantomData,
        }
    }

    /// Load pointer and mark in one atomic read.
    pub fn load(&self) -> (*mut T, bool) {
        split(self.ptr.load(Acquire))
    }

    pub fn get_ptr(&self) -> *mut T {
        self.load().0
    }

    pub fn is_marked(&self) -> bool {
        self.load().1
    }

    /// Replace `(current, current_mark)` with `(new, new_mark)`.
    /// On failure returns the word that was actually found.
    pub fn compare_exchange(
        &self,
        current: *mut T,
        new: *mut T,
        current_mark: bool,
        new_mark: bool,
    ) -> Result<(), (*mut T, bool)> {
        match self.ptr.compare_exchange(
            merge(current, current_mark),
            merge(new, new_mark),
            AcqRel,
            Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(found) => Err(split(found)),
        }
    }

    /// Set the mark, provided the cell still holds `old` unmarked.
    pub fn compare_and_mark(&self, old: *mut T) -> Result<(), (*mut T, bool)> {
        self.compare_exchange(old, old, false, true)
    }

    pub fn store(&self, ptr: *mut T, marked: bool) {
        self.ptr.store(merge(ptr, marked), Release);
    }
}

impl<T> Default for AtomicMarkablePtr<T> {
    fn default() -> Self {
        AtomicMarkablePtr::new(std::ptr::null_mut(), false)
    }
}

impl<T> fmt::Debug for AtomicMarkablePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (ptr, marked) = self.load();
        write!(f, "AtomicMarkablePtr({:?}, marked: {})", ptr, marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_travels_in_the_low_bit() {
        let raw = Box::into_raw(Box::new(5u64));
        assert_eq!(merge(raw, false), raw as usize);
        assert_eq!(merge(raw, true), raw as usize | MARK_BIT);
        assert_eq!(split::<u64>(merge(raw, true)), (raw, true));
        assert_eq!(split::<u64>(merge(raw, false)), (raw, false));
        unsafe { drop(Box::from_raw(raw)) };
    }

    #[test]
    fn test_marked_pointer_rejects_unmarked_cas() {
        let first = Box::into_raw(Box::new(1u64));
        let second = Box::into_raw(Box::new(2u64));
        let cell = AtomicMarkablePtr::new(first, false);

        assert!(cell.compare_and_mark(first).is_ok());
        assert_eq!(cell.load(), (first, true));

        // A marked successor can no longer be swung
        assert_eq!(cell.compare_exchange(first, second, false, false), Err((first, true)));
        assert!(cell.compare_and_mark(first).is_err());
        assert!(cell.compare_exchange(first, second, true, false).is_ok());
        assert_eq!(cell.load(), (second, false));

        unsafe {
            drop(Box::from_raw(first));
            drop(Box::from_raw(second));
        }
    }
}
