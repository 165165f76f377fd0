use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::MAX_IO_BUFFER_SIZE;

/// What a given `IoContext` is currently posted for. Accepts are not a
/// pooled operation here — see the accept-bypass note in the crate's design
/// notes — so this ranges only over the two kinds of I/O that actually get
/// queued against the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Idle,
    Recv,
    Send,
}

/// Per-operation state handed to the kernel (or, on the readiness
/// backend, carried across the poll/syscall/dispatch sequence) for one
/// asynchronous I/O.
pub struct IoContext {
    /// Correlation id used to recover this context from a socket's
    /// outstanding list once its operation completes. Stands in for the
    /// "fixed-offset back-computation from the overlapped record" trick —
    /// the design explicitly allows any O(1) equivalent.
    pub(crate) id: u64,
    pub tag: OpTag,
    pub buf: Vec<u8>,
    pub transferred: usize,
    pub peer_addr: Option<SocketAddr>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl IoContext {
    /// Allocates a standalone context outside any pool's accounting, used
    /// only for a `SocketContext`'s permanently-owned inline recv context.
    pub(crate) fn fresh() -> Self {
        Self::new()
    }

    fn new() -> Self {
        IoContext {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            tag: OpTag::Idle,
            buf: Vec::with_capacity(MAX_IO_BUFFER_SIZE),
            transferred: 0,
            peer_addr: None,
        }
    }

    /// Zeroes the buffer, peer address, and tag.
    pub fn reset(&mut self) {
        self.tag = OpTag::Idle;
        self.buf.clear();
        self.transferred = 0;
        self.peer_addr = None;
    }
}

/// Bounded reservoir of `IoContext`s, free-list discipline.
pub struct IoContextPool {
    capacity: usize,
    idle: Mutex<Vec<Box<IoContext>>>,
    outstanding: AtomicU64,
}

impl IoContextPool {
    pub fn new(capacity: usize) -> Self {
        IoContextPool {
            capacity,
            idle: Mutex::new(Vec::new()),
            outstanding: AtomicU64::new(0),
        }
    }

    /// Pops a reusable context if one is idle, else allocates a fresh one.
    /// Counts toward `outstanding` until the matching `put`.
    pub fn get(&self) -> Box<IoContext> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let mut idle = self.idle.lock().unwrap();
        idle.pop().unwrap_or_else(|| Box::new(IoContext::new()))
    }

    /// Resets and returns `ctx` to the idle list, unless the pool is
    /// already at capacity, in which case it is dropped (destroyed).
    pub fn put(&self, mut ctx: Box<IoContext>) {
        ctx.reset();
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.capacity {
            idle.push(ctx);
        }
    }

    /// Contexts currently checked out (handed to the kernel / a socket's
    /// outstanding list) and not yet returned. The graceful-shutdown
    /// tripwire asserts this is zero once every worker has stopped.
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of contexts currently idle. Exposed for pool-saturation
    /// testing, not part of the steady-state hot path.
    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reuses_returned_contexts() {
        let pool = IoContextPool::new(4);
        let a = pool.get();
        let id = a.id;
        pool.put(a);
        let b = pool.get();
        assert_eq!(b.id, id);
    }

    #[test]
    fn put_beyond_capacity_drops_the_context() {
        let pool = IoContextPool::new(2);
        let ctxs: Vec<_> = (0..5).map(|_| pool.get()).collect();
        for ctx in ctxs {
            pool.put(ctx);
        }
        assert_eq!(pool.idle_len(), 2);
    }

    #[test]
    fn reset_clears_transferred_and_tag() {
        let mut ctx = IoContext::new();
        ctx.tag = OpTag::Recv;
        ctx.transferred = 42;
        ctx.buf.extend_from_slice(b"hello");
        ctx.reset();
        assert_eq!(ctx.tag, OpTag::Idle);
        assert_eq!(ctx.transferred, 0);
        assert!(ctx.buf.is_empty());
    }
}
