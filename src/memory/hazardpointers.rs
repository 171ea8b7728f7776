use std::cell::UnsafeCell;
use std::collections::HashSet;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use thread_local::ThreadLocal;
use tracing::trace;

/// Hazard pointer based reclamation for the nodes of a single structure.
///
/// Each thread that touches the manager lazily receives `num_hp_per_thread`
/// hazard slots, which are pushed onto a global lock-free list and never
/// freed until the manager itself is dropped. A record handed to
/// [`retire`](HPBRManager::retire) is only freed once no slot of any thread
/// protects it.
pub struct HPBRManager<T: Send> {
    thread_info: ThreadLocal<UnsafeCell<ThreadLocalInfo<T>>>,
    head: AtomicPtr<HazardPointer<T>>,
    max_retired: usize,
    num_hp_per_thread: usize,
}

impl<T: Send> fmt::Debug for HPBRManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let retired = match self.thread_info.get() {
            None => 0,
            Some(cell) => unsafe { (*cell.get()).retired_list.len() },
        };

        write!(
            f,
            "HPBRManager(retired_here: {:?}, head: {:?}, max_retired: {:?}, hazards: {:?})",
            retired, self.head, self.max_retired, self.num_hp_per_thread
        )
    }
}

impl<T: Send> HPBRManager<T> {
    pub fn new(max_retired: usize, num_hp_per_thread: usize) -> Self {
        HPBRManager {
            thread_info: ThreadLocal::new(),
            head: AtomicPtr::default(),
            max_retired,
            num_hp_per_thread,
        }
    }

    fn allocate_hp(&self) -> *mut HazardPointer<T> {
        let new_hp_ptr = Box::into_raw(Box::new(HazardPointer::new()));

        // Hazard records are only reclaimed when the manager is dropped
        loop {
            let old_head = self.head.load(Ordering::Acquire);
            unsafe {
                (*new_hp_ptr).next.store(old_head, Ordering::Relaxed);
            }
            if self
                .head
                .compare_exchange_weak(old_head, new_hp_ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        new_hp_ptr
    }

    /// Publish `record` in this thread's hazard slot `hazard_num`.
    ///
    /// The caller must re-validate that `record` is still reachable after
    /// this call before dereferencing it.
    pub fn protect(&self, record: *mut T, hazard_num: usize) {
        self.hazard(hazard_num).protected.store(record, Ordering::SeqCst);
    }

    pub fn unprotect(&self, hazard_num: usize) {
        self.hazard(hazard_num).protected.store(ptr::null_mut(), Ordering::Release);
    }

    /// Clear every slot owned by the calling thread.
    pub fn clear(&self) {
        for hazard_num in 0..self.num_hp_per_thread {
            self.unprotect(hazard_num);
        }
    }

    /// Hand an unlinked record over for reclamation.
    ///
    /// The record must already be unreachable from the structure, and it must
    /// be retired exactly once.
    pub fn retire(&self, record: *mut T) {
        let thread_info = unsafe { self.get_mut_thread_info() };
        thread_info.retired_list.push(record);

        if thread_info.retired_list.len() > self.max_retired {
            self.scan(thread_info);
        }
    }

    /// Number of records this thread has retired that are still waiting
    /// for a scan.
    pub fn retired_len(&self) -> usize {
        match self.thread_info.get() {
            None => 0,
            Some(cell) => unsafe { (*cell.get()).retired_list.len() },
        }
    }

    /// Force a scan of this thread's retired list.
    pub fn collect(&self) {
        let thread_info = unsafe { self.get_mut_thread_info() };
        self.scan(thread_info);
    }

    /// Free every retired record of this thread that no hazard slot protects.
    fn scan(&self, thread_info: &mut ThreadLocalInfo<T>) {
        let mut hazard_set: HashSet<*mut T> = HashSet::new();
        let mut current = self.head.load(Ordering::Acquire);

        while !current.is_null() {
            let hazard_pointer = unsafe { &*current };
            let protected = hazard_pointer.protected.load(Ordering::SeqCst);
            if !protected.is_null() {
                hazard_set.insert(protected);
            }
            current = hazard_pointer.next.load(Ordering::Acquire);
        }

        let before = thread_info.retired_list.len();
        thread_info.retired_list.retain(|&record| {
            if hazard_set.contains(&record) {
                true
            } else {
                unsafe { Self::free(record) };
                false
            }
        });
        trace!(
            freed = before - thread_info.retired_list.len(),
            kept = thread_info.retired_list.len(),
            "hazard pointer scan"
        );
    }

    unsafe fn free(garbage: *mut T) {
        drop(Box::from_raw(garbage));
    }

    fn hazard(&self, hazard_num: usize) -> &HazardPointer<T> {
        debug_assert!(hazard_num < self.num_hp_per_thread);
        let thread_info = unsafe { self.get_mut_thread_info() };
        unsafe { &*thread_info.local_hazards[hazard_num] }
    }

    /// Get the thread local info as a mutable reference, registering fresh
    /// hazard slots on first access from this thread.
    ///
    /// Callers must not hold two of these references at once.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut_thread_info(&self) -> &mut ThreadLocalInfo<T> {
        let thread_info_ptr = self
            .thread_info
            .get_or(|| {
                let starting_hp = (0..self.num_hp_per_thread)
                    .map(|_| self.allocate_hp())
                    .collect();
                UnsafeCell::new(ThreadLocalInfo::new(starting_hp))
            })
            .get();

        &mut *thread_info_ptr
    }
}

impl<T: Send> Drop for HPBRManager<T> {
    fn drop(&mut self) {
        // Exclusive access: no thread can hold a hazard any more
        for cell in self.thread_info.iter_mut() {
            for record in cell.get_mut().retired_list.drain(..) {
                unsafe { Self::free(record) };
            }
        }

        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let hazard_pointer = unsafe { Box::from_raw(current) };
            current = hazard_pointer.next.load(Ordering::Relaxed);
        }
    }
}

struct HazardPointer<T> {
    protected: AtomicPtr<T>,
    next: AtomicPtr<HazardPointer<T>>,
}

impl<T> HazardPointer<T> {
    fn new() -> Self {
        HazardPointer {
            protected: AtomicPtr::default(),
            next: AtomicPtr::default(),
        }
    }
}

struct ThreadLocalInfo<T> {
    local_hazards: Vec<*mut HazardPointer<T>>,
    retired_list: Vec<*mut T>,
}

// Only ever touched by its owning thread, or by the manager's drop
unsafe impl<T: Send> Send for ThreadLocalInfo<T> {}

impl<T> ThreadLocalInfo<T> {
    fn new(starting_hazards: Vec<*mut HazardPointer<T>>) -> Self {
        ThreadLocalInfo {
            local_hazards: starting_hazards,
            retired_list: Vec::new(),
        }
    }
}
