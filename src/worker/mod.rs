//! Worker threads: the loop that dequeues completions, dispatches them by
//! operation tag, and invokes the façade's user callbacks. Workers own no
//! sockets themselves; they share a [`crate::reactor::Reactor`] and both
//! pools with the façade that spawned them.
//!
//! Unlike `sys` and `reactor`, this module has no platform split: every
//! platform difference lives underneath it (raw syscalls in `sys`, the
//! event source in `reactor`), so the dispatch loop itself is the same
//! code on every target.

pub mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use crate::io::{IoContextPool, OpTag, SocketContext, SocketContextPool};
use crate::reactor::{Interest, Reactor, Readiness, Token};
use crate::sys;
use crate::thread::Thread;

use dispatch::{guard_callback, is_orderly_close, TcpHandler, UdpHandler};

/// A worker thread dedicated to TCP completions: accepts on the listener
/// (if this worker is the one that owns it), drains readable sockets, and
/// flushes sockets that blocked on a previous send once they're writable.
pub struct TcpWorker {
    thread: Thread,
}

impl TcpWorker {
    pub fn spawn(
        name: impl Into<String>,
        reactor: Arc<Reactor>,
        io_pool: Arc<IoContextPool>,
        sock_pool: Arc<SocketContextPool>,
        handler: Arc<dyn TcpHandler>,
        listener_id: Option<u32>,
        dequeue_timeout: Duration,
    ) -> crate::error::Result<TcpWorker> {
        let mut thread = Thread::new(name);
        thread.start(move |ctx| {
            let mut events: Vec<Readiness> = Vec::new();
            while !ctx.signalled() {
                let n = reactor.poll(&mut events, dequeue_timeout).unwrap_or(0);
                if n == 0 {
                    probe_liveness(&sock_pool, &reactor, listener_id, handler.as_ref());
                    continue;
                }
                for readiness in events.drain(..) {
                    dispatch_one(
                        readiness,
                        &reactor,
                        &io_pool,
                        &sock_pool,
                        handler.as_ref(),
                        listener_id,
                    );
                }
            }
        })?;
        Ok(TcpWorker { thread })
    }

    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.thread.stop(timeout)
    }
}

fn dispatch_one(
    readiness: Readiness,
    reactor: &Reactor,
    io_pool: &IoContextPool,
    sock_pool: &SocketContextPool,
    handler: &dyn TcpHandler,
    listener_id: Option<u32>,
) {
    let sock_id = readiness.token.0;

    if Some(sock_id) == listener_id {
        accept_loop(sock_id, reactor, sock_pool, handler);
        return;
    }

    let Some(ctx) = sock_pool.get_active(sock_id) else {
        // Completion for a socket already removed from `active`; per the
        // cancellation model this resolves to a null lookup and is
        // silently discarded.
        return;
    };

    if readiness.error || readiness.read_closed {
        close_and_notify(sock_id, sock_pool, reactor, handler);
        return;
    }

    if readiness.readable {
        let Some(sock) = ctx.sock() else { return };
        let result = ctx.with_recv_ctx(|io_ctx| {
            io_ctx.tag = OpTag::Recv;
            io_ctx.buf.resize(crate::io::MAX_IO_BUFFER_SIZE, 0);
            let res = sys::recv(sock, &mut io_ctx.buf);
            if let Ok(n) = res {
                io_ctx.transferred = n;
                io_ctx.buf.truncate(n);
            }
            res
        });
        match result {
            Ok(n) if is_orderly_close(OpTag::Recv, n) => {
                close_and_notify(sock_id, sock_pool, reactor, handler);
                return;
            }
            Ok(_) => {
                let data = ctx.with_recv_ctx(|io_ctx| io_ctx.buf.clone());
                guard_callback(sock_id, "recv", || handler.on_recv(sock_id, &data));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => {
                close_and_notify(sock_id, sock_pool, reactor, handler);
                return;
            }
        }
    }

    if readiness.writable {
        flush_pending_sends(&ctx, io_pool);
    }
}

fn accept_loop(listener_id: u32, reactor: &Reactor, sock_pool: &SocketContextPool, handler: &dyn TcpHandler) {
    let Some(listener_ctx) = sock_pool.get_active(listener_id) else {
        return;
    };
    let Some(listener_fd) = listener_ctx.sock() else {
        return;
    };

    loop {
        match sys::accept(listener_fd) {
            Ok((accepted_fd, peer_addr)) => {
                let local = sys::getsockname(accepted_fd).unwrap_or(peer_addr);
                let shell = sock_pool.get();
                let sock_id = accepted_fd as u32;
                shell.install(accepted_fd, sock_id, local, false);

                if let Err(err) = reactor.register(accepted_fd, Token(sock_id), Interest::READABLE_WRITABLE) {
                    log::warn!("completio: failed to register accepted socket {sock_id}: {err}");
                    sys::close(accepted_fd);
                    continue;
                }

                sock_pool.insert_active(sock_id, shell);
                guard_callback(sock_id, "connect", || handler.on_connect(sock_id));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => {
                log::warn!("completio: accept on listener {listener_id} failed: {e}");
                break;
            }
        }
    }
}

fn flush_pending_sends(ctx: &SocketContext, io_pool: &IoContextPool) {
    let Some(sock) = ctx.sock() else { return };
    for id in ctx.pending_send_ids() {
        let Some(mut io_ctx) = ctx.take_outstanding(id) else {
            continue;
        };
        match sys::send(sock, &io_ctx.buf) {
            Ok(_) => io_pool.put(io_ctx),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                io_ctx.tag = OpTag::Send;
                ctx.attach_outstanding(io_ctx);
            }
            Err(e) => {
                log::debug!("completio: deferred send on sock_id={} failed: {e}", ctx.sock_id());
                io_pool.put(io_ctx);
            }
        }
    }
}

fn close_and_notify(sock_id: u32, sock_pool: &SocketContextPool, reactor: &Reactor, handler: &dyn TcpHandler) {
    if let Some(ctx) = sock_pool.get_active(sock_id) {
        if let Some(sock) = ctx.sock() {
            let _ = reactor.deregister(sock);
        }
        sock_pool.del_active(sock_id);
        guard_callback(sock_id, "disconnect", || handler.on_disconnect(sock_id));
    }
}

/// On a `WaitTimeout` dequeue, probes every non-listener TCP socket with a
/// zero-byte send; a hard failure (not `WouldBlock`) is treated as a
/// disconnect. Kept because the readiness backend gives no OS-level
/// liveness signal for an otherwise-idle socket.
fn probe_liveness(sock_pool: &SocketContextPool, reactor: &Reactor, listener_id: Option<u32>, handler: &dyn TcpHandler) {
    for sock_id in sock_pool.active_ids() {
        if Some(sock_id) == listener_id {
            continue;
        }
        let Some(ctx) = sock_pool.get_active(sock_id) else {
            continue;
        };
        let Some(sock) = ctx.sock() else { continue };
        match sys::send(sock, &[]) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => close_and_notify(sock_id, sock_pool, reactor, handler),
        }
    }
}

/// A worker thread dedicated to UDP completions: drains every readable
/// datagram socket it shares custody of.
pub struct UdpWorker {
    thread: Thread,
}

impl UdpWorker {
    pub fn spawn(
        name: impl Into<String>,
        reactor: Arc<Reactor>,
        sock_pool: Arc<SocketContextPool>,
        handler: Arc<dyn UdpHandler>,
        dequeue_timeout: Duration,
    ) -> crate::error::Result<UdpWorker> {
        let mut thread = Thread::new(name);
        thread.start(move |ctx| {
            let mut events: Vec<Readiness> = Vec::new();
            while !ctx.signalled() {
                let n = reactor.poll(&mut events, dequeue_timeout).unwrap_or(0);
                if n == 0 {
                    continue;
                }
                for readiness in events.drain(..) {
                    let sock_id = readiness.token.0;
                    let Some(ctx) = sock_pool.get_active(sock_id) else {
                        continue;
                    };
                    let Some(sock) = ctx.sock() else { continue };
                    if !readiness.readable {
                        continue;
                    }
                    loop {
                        let mut buf = vec![0u8; crate::io::MAX_IO_BUFFER_SIZE];
                        match sys::recvfrom(sock, &mut buf) {
                            Ok((n, src)) => {
                                buf.truncate(n);
                                guard_callback(sock_id, "recvfrom", || {
                                    handler.on_recvfrom(sock_id, &buf, src)
                                });
                            }
                            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                            Err(e) => {
                                log::debug!("completio: recvfrom on sock_id={sock_id} failed: {e}");
                                break;
                            }
                        }
                    }
                }
            }
        })?;
        Ok(UdpWorker { thread })
    }

    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.thread.stop(timeout)
    }
}
