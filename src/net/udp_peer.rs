use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::io::{SocketContextPool, MAX_IO_BUFFER_SIZE};
use crate::reactor::{Interest, Reactor, Token};
use crate::sockaddr::SockAddr;
use crate::sys;
use crate::worker::{dispatch::UdpHandler, UdpWorker};

use super::Config;

/// A UDP peer: `create` binds one datagram socket (port 0 picks an
/// ephemeral port) and `send_to` writes directly to the OS, synchronously.
/// Datagram sends are not queued through the `IoContextPool` — there is no
/// connection to back-pressure against, only the local socket buffer, and
/// fragmenting a send across a retry would silently reorder datagrams.
pub struct UdpPeer {
    config: Config,
    handler: Arc<dyn UdpHandler>,
    reactor: Option<Arc<Reactor>>,
    sock_pool: Option<Arc<SocketContextPool>>,
    workers: Vec<UdpWorker>,
}

impl UdpPeer {
    pub fn new(handler: Arc<dyn UdpHandler>) -> Self {
        Self::with_config(Config::default(), handler)
    }

    pub fn with_config(config: Config, handler: Arc<dyn UdpHandler>) -> Self {
        UdpPeer {
            config,
            handler,
            reactor: None,
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
        let io_pool = Arc::new(crate::io::IoContextPool::new(self.config.io_pool_capacity));
        let sock_pool = Arc::new(SocketContextPool::new(self.config.sock_pool_idle_capacity, io_pool));

        let worker_count = self.config.resolved_worker_threads().max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            workers.push(UdpWorker::spawn(
                format!("completio-udp-peer-{i}"),
                Arc::clone(&reactor),
                Arc::clone(&sock_pool),
                Arc::clone(&self.handler),
                self.config.udp_dequeue_timeout,
            )?);
        }

        self.reactor = Some(reactor);
        self.sock_pool = Some(sock_pool);
        self.workers = workers;
        Ok(())
    }

    /// Binds a datagram socket to `bind_host:bind_port` (port `0` picks an
    /// ephemeral port) and registers it with the worker pool. Returns the
    /// new `sock_id` and the actually-bound port.
    pub fn create(&self, bind_host: Option<&str>, bind_port: u16) -> Result<(u32, u16)> {
        let reactor = self.reactor.as_ref().ok_or(Error::Logic("peer not started"))?;
        let sock_pool = self.sock_pool.as_ref().unwrap();

        let bind_addr = SockAddr::resolve(bind_host, bind_port)?;
        let sock = sys::new_dgram_socket()?;
        if let Err(e) = sys::bind(sock, bind_addr.into_socket_addr()) {
            sys::close(sock);
            return Err(e.into());
        }

        let local = match sys::getsockname(sock) {
            Ok(addr) => addr,
            Err(e) => {
                sys::close(sock);
                return Err(e.into());
            }
        };
        let sock_id = sock as u32;
        let shell = sock_pool.get();
        shell.install(sock, sock_id, local, false);
        if let Err(e) = reactor.register(sock, Token(sock_id), Interest::READABLE) {
            sys::close(sock);
            return Err(e.into());
        }
        sock_pool.insert_active(sock_id, shell);
        Ok((sock_id, local.port()))
    }

    /// Sends one datagram to `dst_host:dst_port`. A partial OS write (rare
    /// for UDP, but permitted by the syscall) is reported as an error
    /// rather than silently dropping the remainder.
    pub fn send_to(&self, sock_id: u32, data: &[u8], dst_host: &str, dst_port: u16) -> Result<()> {
        let dst = SockAddr::resolve(Some(dst_host), dst_port)?.into_socket_addr();
        self.send_to_addr(sock_id, data, dst)
    }

    pub fn send_to_addr(&self, sock_id: u32, data: &[u8], dst: SocketAddr) -> Result<()> {
        if data.len() > MAX_IO_BUFFER_SIZE {
            return Err(Error::InvalidParameter("send_to exceeds MAX_IO_BUFFER_SIZE"));
        }
        let sock_pool = self.sock_pool.as_ref().ok_or(Error::Logic("peer not started"))?;
        let ctx = sock_pool
            .get_active(sock_id)
            .ok_or(Error::Logic("unknown or closed sock_id"))?;
        let sock = ctx.sock().ok_or(Error::Logic("socket already closed"))?;

        let sent = sys::sendto(sock, data, dst)?;
        if sent != data.len() {
            return Err(Error::Logic("partial datagram send"));
        }
        Ok(())
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
        Ok(())
    }
}

impl Drop for UdpPeer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
