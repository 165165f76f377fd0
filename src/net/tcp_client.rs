use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::io::{IoContextPool, SocketContextPool, MAX_IO_BUFFER_SIZE};
use crate::reactor::{Interest, Reactor, Token};
use crate::sockaddr::SockAddr;
use crate::sys;
use crate::worker::{dispatch::TcpHandler, TcpWorker};

use super::Config;

/// A TCP client: each `connect` opens one socket and hands it to the
/// shared worker pool, just like an accepted connection on `TcpServer` —
/// the only difference is there is no listener and no `on_connect`
/// callback, since a successful `connect` return is the connect signal.
pub struct TcpClient {
    config: Config,
    handler: Arc<dyn TcpHandler>,
    reactor: Option<Arc<Reactor>>,
    io_pool: Option<Arc<IoContextPool>>,
    sock_pool: Option<Arc<SocketContextPool>>,
    workers: Vec<TcpWorker>,
}

impl TcpClient {
    pub fn new(handler: Arc<dyn TcpHandler>) -> Self {
        Self::with_config(Config::default(), handler)
    }

    pub fn with_config(config: Config, handler: Arc<dyn TcpHandler>) -> Self {
        TcpClient {
            config,
            handler,
            reactor: None,
            io_pool: None,
            sock_pool: None,
            workers: Vec::new(),
        }
    }

    /// Spawns the worker pool. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        if self.reactor.is_some() {
            return Ok(());
        }

        let reactor = Arc::new(Reactor::new()?);
        let io_pool = Arc::new(IoContextPool::new(self.config.io_pool_capacity));
        let sock_pool = Arc::new(SocketContextPool::new(
            self.config.sock_pool_idle_capacity,
            Arc::clone(&io_pool),
        ));

        let worker_count = self.config.resolved_worker_threads().max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            workers.push(TcpWorker::spawn(
                format!("completio-tcp-client-{i}"),
                Arc::clone(&reactor),
                Arc::clone(&io_pool),
                Arc::clone(&sock_pool),
                Arc::clone(&self.handler),
                None,
                self.config.tcp_dequeue_timeout,
            )?);
        }

        self.reactor = Some(reactor);
        self.io_pool = Some(io_pool);
        self.sock_pool = Some(sock_pool);
        self.workers = workers;
        Ok(())
    }

    /// Connects synchronously (bounded by `Config::connect_timeout`),
    /// registers the socket with the shared reactor, and posts the first
    /// receive by registering for readability. Returns the new `sock_id`.
    pub fn connect(&self, dst_ip: &str, dst_port: u16) -> Result<u32> {
        let reactor = self.reactor.as_ref().ok_or(Error::Logic("client not started"))?;
        let sock_pool = self.sock_pool.as_ref().unwrap();

        let dst: SocketAddr = SockAddr::resolve(Some(dst_ip), dst_port)?.into_socket_addr();
        let sock = sys::new_stream_socket()?;
        if let Err(err) = sys::connect_blocking(sock, dst, self.config.connect_timeout) {
            sys::close(sock);
            return Err(err.into());
        }

        let local = sys::getsockname(sock)?;
        let sock_id = sock as u32;
        let shell = sock_pool.get();
        shell.install(sock, sock_id, local, false);
        reactor.register(sock, Token(sock_id), Interest::READABLE_WRITABLE)?;
        sock_pool.insert_active(sock_id, shell);
        Ok(sock_id)
    }

    pub fn send(&self, sock_id: u32, data: &[u8]) -> Result<()> {
        if data.len() > MAX_IO_BUFFER_SIZE {
            return Err(Error::InvalidParameter("send exceeds MAX_IO_BUFFER_SIZE"));
        }
        let sock_pool = self.sock_pool.as_ref().ok_or(Error::Logic("client not started"))?;
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

    pub fn stop(&mut self) -> Result<()> {
        for worker in &mut self.workers {
            worker.stop(Duration::from_secs(5));
        }
        self.workers.clear();

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

impl Drop for TcpClient {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
