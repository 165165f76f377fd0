//! Periodic callback timer with two resolution classes.
//!
//! `HighResolution` timers own a dedicated [`Thread`] ticking at their
//! exact interval. `Default` timers share one lazily-created, refcounted
//! process-wide host thread -- the one piece of unavoidable global state
//! this crate carries, matching the design notes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};

use crate::sync::Event;
use crate::thread::Thread;

/// How finely a [`Timer`] is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Ticks on the shared host thread, at whatever granularity the host's
    /// own poll interval provides (a few milliseconds).
    Default,
    /// Ticks on a dedicated thread sleeping exactly `time_span`, which can
    /// achieve sub-millisecond precision where the platform's scheduler
    /// permits it.
    HighResolution,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// A periodic callback. Re-entrancy is prevented: if the previous callback
/// is still executing when the next tick is due, that tick is silently
/// suppressed rather than queued or run concurrently.
pub struct Timer {
    resolution: Resolution,
    interval: Duration,
    callback: Callback,
    active: AtomicBool,
    high_res_thread: Option<Thread>,
    default_state: Option<Arc<TimerState>>,
}

impl Timer {
    pub fn new(resolution: Resolution, interval: Duration, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Timer {
            resolution,
            interval,
            callback: Arc::new(callback),
            active: AtomicBool::new(false),
            high_res_thread: None,
            default_state: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// `Activate(true)` starts the timer (idempotent while already active);
    /// `Activate(false)` stops it and *waits* until any in-flight callback
    /// returns (idempotent while already inactive). Returns `false` only
    /// when a start attempt fails, leaving the timer inactive.
    pub fn activate(&mut self, on: bool) -> bool {
        if on {
            self.start()
        } else {
            self.stop();
            true
        }
    }

    fn start(&mut self) -> bool {
        if self.is_active() {
            return true;
        }
        let ok = match self.resolution {
            Resolution::HighResolution => self.start_high_resolution(),
            Resolution::Default => self.start_default(),
        };
        if ok {
            self.active.store(true, Ordering::Release);
        }
        ok
    }

    fn start_high_resolution(&mut self) -> bool {
        let mut thread = Thread::new("completio-timer-hi");
        let callback = Arc::clone(&self.callback);
        let interval = self.interval;
        let started = thread
            .start(move |ctx| {
                while !ctx.wait_unless_signalled(interval) {
                    callback();
                }
            })
            .is_ok();
        if started {
            self.high_res_thread = Some(thread);
        }
        started
    }

    fn start_default(&mut self) -> bool {
        let host = default_timer_host();
        let state = Arc::new(TimerState {
            interval: self.interval,
            next_due: Mutex::new(Instant::now() + self.interval),
            not_running: Event::new(),
            callback: Arc::clone(&self.callback),
        });
        state.not_running.signal(); // idle
        host.register(Arc::clone(&state));
        self.default_state = Some(state);
        true
    }

    fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        match self.resolution {
            Resolution::HighResolution => {
                if let Some(mut thread) = self.high_res_thread.take() {
                    thread.stop(Duration::MAX);
                }
            }
            Resolution::Default => {
                if let Some(state) = self.default_state.take() {
                    // Dropping `state` here (our only strong ref besides the
                    // host's `Weak`) means the host will stop ticking it on
                    // its next sweep; wait out any callback already in
                    // flight so `Activate(false)` has the same "waits until
                    // any in-flight callback returns" contract as the
                    // high-resolution path.
                    state.not_running.wait(Duration::from_secs(5));
                }
            }
        }
        self.active.store(false, Ordering::Release);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared state for a `Default`-resolution timer, registered with the
/// process-wide host.
struct TimerState {
    interval: Duration,
    next_due: Mutex<Instant>,
    /// Set when idle, cleared while the callback is executing.
    not_running: Event,
    callback: Callback,
}

impl TimerState {
    fn tick_if_due(&self, now: Instant) {
        let mut due = self.next_due.lock().unwrap();
        if now < *due {
            return;
        }
        if !self.not_running.is_set() {
            // Previous callback still running: suppress this tick.
            return;
        }
        self.not_running.reset();
        *due = now + self.interval;
        drop(due);
        (self.callback)();
        self.not_running.signal();
    }
}

const HOST_TICK: Duration = Duration::from_millis(5);

struct TimerHost {
    thread: Mutex<Thread>,
    timers: Mutex<Vec<Weak<TimerState>>>,
}

impl TimerHost {
    fn register(&self, state: Arc<TimerState>) {
        self.timers.lock().unwrap().push(Arc::downgrade(&state));
    }
}

static DEFAULT_HOST: OnceLock<Mutex<Weak<TimerHost>>> = OnceLock::new();

/// Returns the lazily-created, refcounted process-wide `Default`-timer
/// host, creating (and starting) it if this is the first active
/// `Default` timer.
fn default_timer_host() -> Arc<TimerHost> {
    let slot = DEFAULT_HOST.get_or_init(|| Mutex::new(Weak::new()));
    let mut guard = slot.lock().unwrap();
    if let Some(host) = guard.upgrade() {
        return host;
    }

    let host = Arc::new(TimerHost {
        thread: Mutex::new(Thread::new("completio-timer-host")),
        timers: Mutex::new(Vec::new()),
    });

    {
        let host_for_loop = Arc::downgrade(&host);
        host.thread.lock().unwrap().start(move |ctx| {
            while !ctx.wait_unless_signalled(HOST_TICK) {
                let Some(host) = host_for_loop.upgrade() else {
                    return;
                };
                let now = Instant::now();
                let mut timers = host.timers.lock().unwrap();
                timers.retain(|w| w.strong_count() > 0);
                for weak in timers.iter() {
                    if let Some(state) = weak.upgrade() {
                        state.tick_if_due(now);
                    }
                }
            }
        }).expect("spawning the timer host thread should not fail");
    }

    *guard = Arc::downgrade(&host);
    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread::sleep;

    #[test]
    fn high_resolution_ticks_periodically() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut t = Timer::new(Resolution::HighResolution, Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(t.activate(true));
        sleep(Duration::from_millis(120));
        t.activate(false);
        let n = count.load(Ordering::SeqCst);
        assert!(n >= 3, "expected several ticks, got {n}");
    }

    #[test]
    fn default_resolution_ticks_on_shared_host() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut t = Timer::new(Resolution::Default, Duration::from_millis(20), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(t.activate(true));
        sleep(Duration::from_millis(150));
        t.activate(false);
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn activate_is_idempotent_per_direction() {
        let mut t = Timer::new(Resolution::HighResolution, Duration::from_millis(50), || {});
        assert!(t.activate(true));
        assert!(t.activate(true));
        t.activate(false);
        t.activate(false);
    }

    #[test]
    fn reentrant_tick_is_suppressed() {
        let overlap = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));
        let o = Arc::clone(&overlap);
        let r = Arc::clone(&running);
        let mut t = Timer::new(Resolution::HighResolution, Duration::from_millis(5), move || {
            if r.swap(true, Ordering::SeqCst) {
                o.store(true, Ordering::SeqCst);
            }
            sleep(Duration::from_millis(30));
            r.store(false, Ordering::SeqCst);
        });
        t.activate(true);
        sleep(Duration::from_millis(80));
        t.activate(false);
        assert!(!overlap.load(Ordering::SeqCst));
    }
}
