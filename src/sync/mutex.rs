//! A recursive mutual-exclusion lock with an RAII scoped guard.
//!
//! `std::sync::Mutex` deadlocks if the owning thread re-enters it, but the
//! pool and worker code in this crate sometimes calls back into itself while
//! already holding a lock (e.g. a socket-context reset that drains its
//! outstanding I/O list while the caller is still inside the active-map
//! critical section). [`Mutex`] tracks the owning thread and an acquisition
//! count so the same thread may re-enter freely, and must release the same
//! number of times before another thread can proceed.

use std::cell::UnsafeCell;
use std::sync::{Condvar, Mutex as StdMutex};
use std::thread::{self, ThreadId};

struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// A recursive mutex guarding a `T`.
pub struct Mutex<T> {
    owner: StdMutex<Owner>,
    released: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through `MutexGuard`, which
// is only constructed while holding `owner`'s lock and recording this
// thread as the (possibly re-entrant) owner.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Mutex {
            owner: StdMutex::new(Owner {
                thread: None,
                depth: 0,
            }),
            released: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, returning a scoped guard that releases it on
    /// every exit path (including unwinding) when dropped.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap();
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    break;
                }
                Some(t) if t == me => {
                    owner.depth += 1;
                    break;
                }
                Some(_) => {
                    owner = self.released.wait(owner).unwrap();
                }
            }
        }
        drop(owner);
        MutexGuard { mutex: self }
    }

    fn unlock_one(&self) {
        let mut owner = self.owner.lock().unwrap();
        debug_assert_eq!(owner.thread, Some(thread::current().id()));
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }
}

/// RAII guard returned by [`Mutex::lock`]. Releases one level of recursion
/// on drop; the underlying lock is only actually released once every
/// acquisition by the owning thread has been matched by a guard drop.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: only the owning thread holds a guard at any given depth.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reentrant_lock_same_thread() {
        let m = Mutex::new(0);
        let g1 = m.lock();
        let g2 = m.lock();
        drop(g2);
        drop(g1);
        let mut g = m.lock();
        *g += 1;
        assert_eq!(*g, 1);
    }

    #[test]
    fn excludes_other_threads() {
        let m = Arc::new(Mutex::new(0));
        let g = m.lock();
        let m2 = Arc::clone(&m);
        let handle = thread::spawn(move || {
            let mut g = m2.lock();
            *g += 1;
        });
        thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(*g, 0);
        drop(g);
        handle.join().unwrap();
        assert_eq!(*m.lock(), 1);
    }

    #[test]
    fn releases_on_panic_unwind() {
        let m = Arc::new(Mutex::new(0));
        let m2 = Arc::clone(&m);
        let result = std::panic::catch_unwind(move || {
            let _g = m2.lock();
            panic!("boom");
        });
        assert!(result.is_err());
        let _g = m.lock();
    }
}
