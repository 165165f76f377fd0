//! A named OS thread with a cooperative stop signal, the substrate every
//! worker, timer host and logger flush thread in this crate runs on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, warn};

use crate::error::{Error, Result};
use crate::sync::Event;

/// 20 KiB, matching the configured worker-thread stack size. Platforms that
/// enforce a larger minimum silently round this up.
pub const STACK_SIZE: usize = 20 * 1024;

/// Handed to the user's run function so it can cooperate with [`Thread::stop`].
#[derive(Clone)]
pub struct ThreadContext {
    stop: Arc<Event>,
}

impl ThreadContext {
    /// `true` once `Stop` has begun. Run loops must check this on every
    /// iteration and return promptly when it becomes true.
    pub fn signalled(&self) -> bool {
        self.stop.is_set()
    }

    /// Blocks the calling (worker) thread until either `timeout` elapses or
    /// the thread has been signalled to stop, returning `true` in the
    /// latter case. Useful for a worker's "wait for more work" step.
    pub fn wait_unless_signalled(&self, timeout: Duration) -> bool {
        self.stop.wait(timeout)
    }
}

struct Shared {
    running: AtomicBool,
    finished: Event,
    stop: Arc<Event>,
}

/// A named OS thread that can be `Start`ed and `Stop`ped repeatedly.
pub struct Thread {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    pub fn new(name: impl Into<String>) -> Self {
        Thread {
            name: name.into(),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                finished: Event::new(),
                stop: Arc::new(Event::new()),
            }),
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Starts the thread running `run`. Idempotent: a second call while
    /// already running is a no-op success. On spawn failure returns
    /// [`Error::Runtime`] and leaves no thread created.
    pub fn start<F>(&mut self, run: F) -> Result<()>
    where
        F: FnOnce(&ThreadContext) + Send + 'static,
    {
        if self.is_running() {
            return Ok(());
        }

        self.shared.stop.reset();
        self.shared.finished.reset();
        self.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let ctx = ThreadContext {
            stop: Arc::clone(&self.shared.stop),
        };
        let name = self.name.clone();

        let builder = std::thread::Builder::new()
            .name(self.name.clone())
            .stack_size(STACK_SIZE);

        let spawned = builder.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| run(&ctx)));
            if let Err(panic) = result {
                error!("thread '{name}' panicked: {}", describe_panic(&panic));
            }
            shared.running.store(false, Ordering::Release);
            shared.finished.signal();
        });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(_) => {
                self.shared.running.store(false, Ordering::Release);
                Err(Error::Runtime("failed to spawn thread"))
            }
        }
    }

    /// Signals the stop event and waits up to `timeout` for the run
    /// function to return. Rust has no portable forced-termination
    /// primitive, so a timed-out `Stop` detaches the handle instead of
    /// blocking forever or killing the OS thread; the run function is
    /// expected to notice `signalled()` promptly. Returns `true` if the
    /// thread finished within `timeout`.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.shared.stop.signal();

        if !self.is_running() && self.handle.is_none() {
            return true;
        }

        let finished = self.shared.finished.wait(timeout);
        if finished {
            if let Some(handle) = self.handle.take() {
                if let Err(panic) = handle.join() {
                    warn!(
                        "thread '{}' join observed a panic after signalling: {}",
                        self.name,
                        describe_panic(&panic)
                    );
                }
            }
        } else {
            warn!(
                "thread '{}' did not stop within {:?}; detaching",
                self.name, timeout
            );
        }
        finished
    }

    pub fn signalled(&self) -> bool {
        self.shared.stop.is_set()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.is_running() || self.handle.is_some() {
            self.stop(Duration::from_millis(500));
        }
    }
}

fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn start_is_idempotent() {
        let mut t = Thread::new("idempotent");
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        t.start(move |ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            while !ctx.signalled() {
                ctx.wait_unless_signalled(Duration::from_millis(10));
            }
        })
        .unwrap();
        t.start(|_| {}).unwrap();
        t.stop(Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_waits_for_cooperative_exit() {
        let mut t = Thread::new("cooperative");
        t.start(|ctx| {
            while !ctx.signalled() {
                ctx.wait_unless_signalled(Duration::from_millis(5));
            }
        })
        .unwrap();
        assert!(t.stop(Duration::from_secs(2)));
        assert!(!t.is_running());
    }

    #[test]
    fn restart_after_stop() {
        let mut t = Thread::new("restart");
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let r = Arc::clone(&runs);
            t.start(move |ctx| {
                r.fetch_add(1, Ordering::SeqCst);
                ctx.wait_unless_signalled(Duration::from_secs(5));
            })
            .unwrap();
            t.stop(Duration::from_secs(2));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_run_does_not_poison_thread_handle() {
        let mut t = Thread::new("panicky");
        t.start(|_| panic!("boom")).unwrap();
        assert!(t.stop(Duration::from_secs(1)));
    }
}
