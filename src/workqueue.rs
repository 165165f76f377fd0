//! A single-consumer FIFO of typed tasks executed on a dedicated worker
//! thread, for handing off the long-running work that socket callbacks must
//! never do inline.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::thread::Thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    queue: Mutex<VecDeque<Task>>,
    has_work: Condvar,
}

/// A FIFO queue of boxed closures, drained in submission order by one
/// dedicated worker thread.
pub struct WorkQueue {
    inner: Arc<Inner>,
    worker: Thread,
}

impl WorkQueue {
    /// Creates and immediately starts a work queue backed by a thread named
    /// `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            has_work: Condvar::new(),
        });

        let mut worker = Thread::new(name.into());
        let loop_inner = Arc::clone(&inner);
        worker
            .start(move |ctx| {
                loop {
                    let task = {
                        let mut queue = loop_inner.queue.lock().unwrap();
                        loop {
                            if let Some(task) = queue.pop_front() {
                                break Some(task);
                            }
                            if ctx.signalled() {
                                break None;
                            }
                            let (guard, _) = loop_inner
                                .has_work
                                .wait_timeout(queue, Duration::from_millis(100))
                                .unwrap();
                            queue = guard;
                        }
                    };
                    match task {
                        Some(task) => task(),
                        None => return,
                    }
                }
            })
            .expect("spawning a work queue's worker thread should not fail");

        WorkQueue { inner, worker }
    }

    /// Appends a task to the back of the queue; it runs after every task
    /// already queued.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.inner.queue.lock().unwrap().push_back(Box::new(task));
        self.inner.has_work.notify_one();
    }

    /// Number of tasks not yet started.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// Signals the worker to stop after draining any task it has already
    /// popped, waiting up to `timeout`. Queued-but-not-started tasks are
    /// dropped, not run.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.inner.has_work.notify_one();
        self.worker.stop(timeout)
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.stop(Duration::from_millis(500));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tasks_run_in_fifo_order() {
        let wq = WorkQueue::new("wq-fifo");
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = Arc::clone(&order);
            wq.post(move || order.lock().unwrap().push(i));
        }
        // Give the single consumer time to drain; FIFO is structural, not
        // timing-dependent, but we need to wait for it to finish.
        std::thread::sleep(Duration::from_millis(100));
        let order = order.lock().unwrap();
        assert_eq!(*order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn all_posted_tasks_execute() {
        let wq = WorkQueue::new("wq-count");
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let c = Arc::clone(&count);
            wq.post(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }
}
