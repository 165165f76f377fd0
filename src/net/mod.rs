//! The public façade: `TcpServer`, `TcpClient`, `UdpPeer`. Each owns one
//! reactor, one `IoContextPool`, one `SocketContextPool`, and a fixed set
//! of worker threads; application code never touches those directly.

mod config;
mod tcp_client;
mod tcp_server;
mod udp_peer;

pub use config::Config;
pub use tcp_client::TcpClient;
pub use tcp_server::TcpServer;
pub use udp_peer::UdpPeer;

pub use crate::worker::dispatch::{TcpHandler, UdpHandler};
