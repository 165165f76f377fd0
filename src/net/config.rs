use std::time::Duration;

/// Fixed size of every I/O context's buffer; sends larger than this are
/// rejected rather than fragmented.
pub const MAX_IO_BUFFER_SIZE: usize = crate::io::MAX_IO_BUFFER_SIZE;

/// Worker threads spawned per available CPU, absent an explicit override.
pub const WORKER_THREADS_PER_PROCESSOR: usize = 2;

/// Default `IoContextPool` capacity.
pub const MEM_POOL_SIZE: usize = 1000;

/// Tuning knobs for a `TcpServer`/`TcpClient`/`UdpPeer` instance. All
/// fields default to the values named in the external interfaces, so
/// callers who don't care about a given knob never have to think about
/// it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker threads to spawn. `None` means `WORKER_THREADS_PER_PROCESSOR
    /// * available_parallelism()`.
    pub worker_threads: Option<usize>,
    /// Capacity of the `IoContextPool`.
    pub io_pool_capacity: usize,
    /// Capacity of the `SocketContextPool`'s idle list.
    pub sock_pool_idle_capacity: usize,
    /// How long a worker blocks per dequeue before re-checking its stop
    /// signal. TCP workers also use this as the liveness-probe interval.
    pub tcp_dequeue_timeout: Duration,
    /// As above, for UDP workers (shorter: no liveness probe to pace).
    pub udp_dequeue_timeout: Duration,
    /// Bound on `TcpClient::connect`'s synchronous wait for the
    /// three-way handshake to complete.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_threads: None,
            io_pool_capacity: MEM_POOL_SIZE,
            sock_pool_idle_capacity: 2 * MEM_POOL_SIZE,
            tcp_dequeue_timeout: crate::worker::dispatch::TCP_DEQUEUE_TIMEOUT,
            udp_dequeue_timeout: crate::worker::dispatch::UDP_DEQUEUE_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub(crate) fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            WORKER_THREADS_PER_PROCESSOR * cpus
        })
    }
}
