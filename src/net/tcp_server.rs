use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::io::{IoContextPool, SocketContextPool, MAX_IO_BUFFER_SIZE};
use crate::reactor::{Interest, Reactor, Token};
use crate::sockaddr::SockAddr;
use crate::sys;
use crate::worker::{dispatch::TcpHandler, TcpWorker};

use super::Config;

/// A TCP listener that accepts connections, dispatches `on_connect`,
/// `on_recv`, and `on_disconnect` on worker threads, and lets the caller
/// push data back out with `send`.
///
/// Mirrors the original `Init`/`Start`/`Send`/`CloseSocket`/`Stop`/`DeInit`
/// contract: `new` replaces `Init`, `start` is `Start`, and `Drop` (via
/// `stop`) replaces `DeInit` since there is no separate teardown step in
/// Rust once every handle is owned.
pub struct TcpServer {
    config: Config,
    handler: Arc<dyn TcpHandler>,
    bind_addr: SockAddr,
    reactor: Option<Arc<Reactor>>,
    io_pool: Option<Arc<IoContextPool>>,
    sock_pool: Option<Arc<SocketContextPool>>,
    listener_id: Option<u32>,
    workers: Vec<TcpWorker>,
}

impl TcpServer {
    pub fn new(handler: Arc<dyn TcpHandler>, host: Option<&str>, port: u16) -> Result<Self> {
        Self::with_config(Config::default(), handler, host, port)
    }

    pub fn with_config(config: Config, handler: Arc<dyn TcpHandler>, host: Option<&str>, port: u16) -> Result<Self> {
        Ok(TcpServer {
            bind_addr: SockAddr::resolve(host, port)?,
            config,
            handler,
            reactor: None,
            io_pool: None,
            sock_pool: None,
            listener_id: None,
            workers: Vec::new(),
        })
    }

    /// Binds, listens, and spawns the worker pool. Idempotent: a second
    /// call while already started is a no-op success.
    pub fn start(&mut self) -> Result<()> {
        if self.listener_id.is_some() {
            return Ok(());
        }

        let reactor = Arc::new(Reactor::new()?);
        let io_pool = Arc::new(IoContextPool::new(self.config.io_pool_capacity));
        let sock_pool = Arc::new(SocketContextPool::new(
            self.config.sock_pool_idle_capacity,
            Arc::clone(&io_pool),
        ));

        let listener = sys::new_stream_socket()?;
        sys::set_reuseaddr(listener, true)?;
        sys::bind(listener, self.bind_addr.into_socket_addr())?;
        sys::listen(listener, sys::LISTEN_BACKLOG)?;
        let local = sys::getsockname(listener)?;

        let listener_id = listener as u32;
        let shell = sock_pool.get();
        shell.install(listener, listener_id, local, true);
        reactor.register(listener, Token(listener_id), Interest::READABLE)?;
        sock_pool.insert_active(listener_id, shell);

        let worker_count = self.config.resolved_worker_threads().max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            workers.push(TcpWorker::spawn(
                format!("completio-tcp-server-{i}"),
                Arc::clone(&reactor),
                Arc::clone(&io_pool),
                Arc::clone(&sock_pool),
                Arc::clone(&self.handler),
                Some(listener_id),
                self.config.tcp_dequeue_timeout,
            )?);
        }

        self.reactor = Some(reactor);
        self.io_pool = Some(io_pool);
        self.sock_pool = Some(sock_pool);
        self.listener_id = Some(listener_id);
        self.workers = workers;
        Ok(())
    }

    /// The bound local address, valid once `start` has succeeded.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        let id = self.listener_id?;
        self.sock_pool.as_ref()?.get_active(id)?.local_addr()
    }

    /// Queues `data` for delivery to `sock_id`. Truncation/oversize is an
    /// error rather than a silent split, matching the single-buffer
    /// per-I/O design.
    pub fn send(&self, sock_id: u32, data: &[u8]) -> Result<()> {
        if data.len() > MAX_IO_BUFFER_SIZE {
            return Err(Error::InvalidParameter("send exceeds MAX_IO_BUFFER_SIZE"));
        }
        let sock_pool = self.sock_pool.as_ref().ok_or(Error::Logic("server not started"))?;
        let ctx = sock_pool
            .get_active(sock_id)
            .ok_or(Error::Logic("unknown or closed sock_id"))?;
        let sock = ctx.sock().ok_or(Error::Logic("socket already closed"))?;

        let io_pool = self.io_pool.as_ref().unwrap();
        let mut io_ctx = io_pool.get();
        io_ctx.tag = crate::io::OpTag::Send;
        io_ctx.buf.extend_from_slice(data);

        match sys::send(sock, &io_ctx.buf) {
            Ok(_) => {
                io_pool.put(io_ctx);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                ctx.attach_outstanding(io_ctx);
                Ok(())
            }
            Err(e) => {
                io_pool.put(io_ctx);
                Err(e.into())
            }
        }
    }

    /// Closes `sock_id` from the caller's side: synchronous, idempotent,
    /// and does not itself invoke `on_disconnect` (that callback is
    /// reserved for the peer-initiated or error-detected case).
    pub fn close_socket(&self, sock_id: u32) {
        let (Some(reactor), Some(sock_pool)) = (self.reactor.as_ref(), self.sock_pool.as_ref()) else {
            return;
        };
        if let Some(ctx) = sock_pool.get_active(sock_id) {
            if let Some(sock) = ctx.sock() {
                let _ = reactor.deregister(sock);
            }
        }
        sock_pool.del_active(sock_id);
    }

    /// Stops every worker and tears down the listener. Asserts in debug
    /// builds that the I/O context pool has no outstanding checkouts left.
    pub fn stop(&mut self) -> Result<()> {
        for worker in &mut self.workers {
            worker.stop(Duration::from_secs(5));
        }
        self.workers.clear();

        if let (Some(id), Some(sock_pool)) = (self.listener_id.take(), self.sock_pool.as_ref()) {
            if let (Some(ctx), Some(reactor)) = (sock_pool.get_active(id), self.reactor.as_ref()) {
                if let Some(sock) = ctx.sock() {
                    let _ = reactor.deregister(sock);
                }
            }
            sock_pool.del_active(id);
        }

        if let Some(io_pool) = &self.io_pool {
            debug_assert_eq!(
                io_pool.outstanding(),
                0,
                "completio: IoContextPool leaked outstanding contexts past Stop()"
            );
        }
        Ok(())
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
