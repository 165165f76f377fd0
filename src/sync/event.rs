//! A manual-reset signaling event with timed wait, built on a
//! [`Mutex`]/[`Condvar`] pair -- the substrate every other blocking
//! primitive in this crate (`Thread::stop`, `Timer`'s tick suppression, the
//! logger's 100 ms swap tick) is expressed in terms of.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A signal with two states, `clear` and `set`, initially `clear`.
///
/// `signal` wakes every current and future waiter until the next `reset`.
/// Safe to `signal` from any thread, including from inside a waiter's own
/// callback.
#[derive(Debug)]
pub struct Event {
    state: Mutex<bool>,
    cond: Condvar,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    pub fn new() -> Self {
        Event {
            state: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Clears the signal.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = false;
    }

    /// Sets the signal and wakes every waiter.
    pub fn signal(&self) {
        *self.state.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap()
    }

    /// Waits up to `timeout` for the event to become set, returning `true`
    /// if it did. A zero timeout is a non-blocking poll.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut guard = self.state.lock().unwrap();
        if *guard {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if *guard {
                return true;
            }
            let Some(deadline) = deadline else {
                // Saturating timeout (our stand-in for "wait forever"): keep
                // waiting in bounded slices so spurious wakeups don't loop
                // forever on a platform with a misbehaving Condvar.
                let (g, _) = self.cond.wait_timeout(guard, Duration::from_secs(3600)).unwrap();
                guard = g;
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return *guard;
            }
            let (g, result) = self.cond.wait_timeout(guard, deadline - now).unwrap();
            guard = g;
            if result.timed_out() && !*guard {
                return false;
            }
        }
    }

    /// Waits indefinitely for the event to become set.
    pub fn wait_forever(&self) {
        let mut guard = self.state.lock().unwrap();
        while !*guard {
            guard = self.cond.wait(guard).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_wakes_poll() {
        let ev = Event::new();
        assert!(!ev.wait(Duration::from_millis(0)));
        ev.signal();
        assert!(ev.wait(Duration::from_millis(0)));
    }

    #[test]
    fn stays_set_until_reset() {
        let ev = Event::new();
        ev.signal();
        assert!(ev.wait(Duration::from_millis(0)));
        assert!(ev.wait(Duration::from_millis(0)));
        ev.reset();
        assert!(!ev.wait(Duration::from_millis(0)));
    }

    #[test]
    fn multiple_waiters_all_wake() {
        let ev = Arc::new(Event::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ev = Arc::clone(&ev);
                thread::spawn(move || ev.wait(Duration::from_secs(5)))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        ev.signal();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn timeout_expires_without_signal() {
        let ev = Event::new();
        let start = Instant::now();
        assert!(!ev.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
