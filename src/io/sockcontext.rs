use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::sys::RawSocket;

use super::{IoContext, IoContextPool, OpTag};

struct Inner {
    sock: Option<RawSocket>,
    local_addr: Option<SocketAddr>,
    is_listen: bool,
    recv_ctx: Box<IoContext>,
    /// Outstanding (non-recv) I/Os, keyed by `IoContext::id`.
    list_io: HashMap<u64, Box<IoContext>>,
}

/// Per-socket shell: the handle, its id, its inline receive context, and
/// the list of outstanding sends/accepts. Shared (`Arc`) because a worker
/// mid-dispatch and the active map may both hold a reference at once.
pub struct SocketContext {
    sock_id: AtomicU32,
    io_pool: Arc<IoContextPool>,
    inner: Mutex<Inner>,
}

impl SocketContext {
    fn new_shell(io_pool: Arc<IoContextPool>) -> Self {
        let recv_ctx = Box::new(IoContext::fresh());
        SocketContext {
            sock_id: AtomicU32::new(0),
            io_pool,
            inner: Mutex::new(Inner {
                sock: None,
                local_addr: None,
                is_listen: false,
                recv_ctx,
                list_io: HashMap::new(),
            }),
        }
    }

    pub fn sock_id(&self) -> u32 {
        self.sock_id.load(Ordering::Acquire)
    }

    /// Installs a live socket into a shell freshly obtained from the pool.
    pub fn install(&self, sock: RawSocket, sock_id: u32, local_addr: SocketAddr, is_listen: bool) {
        self.sock_id.store(sock_id, Ordering::Release);
        let mut inner = self.inner.lock().unwrap();
        inner.sock = Some(sock);
        inner.local_addr = Some(local_addr);
        inner.is_listen = is_listen;
    }

    pub fn sock(&self) -> Option<RawSocket> {
        self.inner.lock().unwrap().sock
    }

    pub fn is_listen(&self) -> bool {
        self.inner.lock().unwrap().is_listen
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().unwrap().local_addr
    }

    /// Runs `f` with exclusive access to the inline receive buffer.
    pub fn with_recv_ctx<R>(&self, f: impl FnOnce(&mut IoContext) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.recv_ctx)
    }

    /// Registers a freshly-obtained `IoContext` (send/accept) as
    /// outstanding against this socket, returning its correlation id.
    pub fn attach_outstanding(&self, ctx: Box<IoContext>) -> u64 {
        let id = ctx.id;
        self.inner.lock().unwrap().list_io.insert(id, ctx);
        id
    }

    /// Removes and returns a previously-attached outstanding context by
    /// its correlation id, e.g. on send completion.
    pub fn take_outstanding(&self, id: u64) -> Option<Box<IoContext>> {
        self.inner.lock().unwrap().list_io.remove(&id)
    }

    pub fn outstanding_len(&self) -> usize {
        self.inner.lock().unwrap().list_io.len()
    }

    /// Correlation ids of outstanding contexts tagged `Send`, i.e. sends
    /// that blocked on a previous attempt and are waiting for writability.
    pub fn pending_send_ids(&self) -> Vec<u64> {
        self.inner
            .lock()
            .unwrap()
            .list_io
            .iter()
            .filter(|(_, ctx)| ctx.tag == OpTag::Send)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Shuts down and closes the socket if still valid, clears the local
    /// address, resets the inline recv context, and drains every
    /// outstanding `IoContext` back to the pool.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sock) = inner.sock.take() {
            crate::sys::shutdown(sock);
            crate::sys::close(sock);
        }
        inner.local_addr = None;
        inner.is_listen = false;
        inner.recv_ctx.reset();
        for (_, ctx) in inner.list_io.drain() {
            self.io_pool.put(ctx);
        }
        self.sock_id.store(0, Ordering::Release);
    }
}

/// Two mutex-guarded collections: an idle list of reusable shells, and an
/// `active` map from `sock_id` to the in-use shell it names.
pub struct SocketContextPool {
    idle_capacity: usize,
    idle: Mutex<Vec<Arc<SocketContext>>>,
    active: Mutex<HashMap<u32, Arc<SocketContext>>>,
    io_pool: Arc<IoContextPool>,
}

impl SocketContextPool {
    pub fn new(idle_capacity: usize, io_pool: Arc<IoContextPool>) -> Self {
        SocketContextPool {
            idle_capacity,
            idle: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            io_pool,
        }
    }

    /// Obtains a shell (reused or freshly allocated) ready for `install`.
    pub fn get(&self) -> Arc<SocketContext> {
        let mut idle = self.idle.lock().unwrap();
        idle.pop()
            .unwrap_or_else(|| Arc::new(SocketContext::new_shell(Arc::clone(&self.io_pool))))
    }

    /// Moves `ctx` into the active map under `sock_id`.
    pub fn insert_active(&self, sock_id: u32, ctx: Arc<SocketContext>) {
        self.active.lock().unwrap().insert(sock_id, ctx);
    }

    /// Returns a shared reference to the active context for `sock_id`, or
    /// `None` if it was never registered or has already been closed.
    pub fn get_active(&self, sock_id: u32) -> Option<Arc<SocketContext>> {
        self.active.lock().unwrap().get(&sock_id).cloned()
    }

    /// Atomically removes `sock_id` from `active`, resets the shell, and
    /// re-admits it to the idle list if capacity allows.
    pub fn del_active(&self, sock_id: u32) -> Option<Arc<SocketContext>> {
        let ctx = self.active.lock().unwrap().remove(&sock_id)?;
        ctx.reset();
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.idle_capacity {
            idle.push(Arc::clone(&ctx));
        }
        Some(ctx)
    }

    pub fn active_len(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Snapshot of currently active socket ids, used by the worker's
    /// liveness probe and by graceful-shutdown accounting.
    pub fn active_ids(&self) -> Vec<u32> {
        self.active.lock().unwrap().keys().copied().collect()
    }

    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> SocketContextPool {
        SocketContextPool::new(2, Arc::new(IoContextPool::new(4)))
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let pool = pools();
        let ctx = pool.get();
        ctx.install(0, 7, "127.0.0.1:9000".parse().unwrap(), false);
        pool.insert_active(7, ctx);
        assert!(pool.get_active(7).is_some());
        assert_eq!(pool.active_len(), 1);
    }

    #[test]
    fn del_active_resets_and_recycles_shell() {
        let pool = pools();
        let ctx = pool.get();
        ctx.install(0, 7, "127.0.0.1:9000".parse().unwrap(), false);
        pool.insert_active(7, ctx);
        pool.del_active(7);
        assert!(pool.get_active(7).is_none());
        assert_eq!(pool.idle_len(), 1);
        assert_eq!(pool.active_len(), 0);
    }

    #[test]
    fn outstanding_contexts_are_returned_to_io_pool_on_reset() {
        let io_pool = Arc::new(IoContextPool::new(4));
        let pool = SocketContextPool::new(2, Arc::clone(&io_pool));
        let ctx = pool.get();
        ctx.install(0, 1, "127.0.0.1:9000".parse().unwrap(), false);
        let io_ctx = io_pool.get();
        ctx.attach_outstanding(io_ctx);
        assert_eq!(ctx.outstanding_len(), 1);
        pool.insert_active(1, ctx);
        pool.del_active(1);
        assert_eq!(io_pool.idle_len(), 1);
    }
}
