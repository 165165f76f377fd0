// Not all functions are used by all tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Once};

use completio::{TcpHandler, UdpHandler};

pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::try_init();
    })
}

/// A `TcpHandler` that forwards every callback onto an mpsc channel, so
/// test bodies can `recv_timeout` for the event they're waiting on instead
/// of racing the worker threads with sleeps.
pub struct RecordingTcpHandler {
    pub connect_tx: Sender<u32>,
    pub recv_tx: Sender<(u32, Vec<u8>)>,
    pub disconnect_tx: Sender<u32>,
}

pub struct RecordingTcp {
    pub handler: Arc<RecordingTcpHandler>,
    pub connect_rx: Receiver<u32>,
    pub recv_rx: Receiver<(u32, Vec<u8>)>,
    pub disconnect_rx: Receiver<u32>,
}

pub fn recording_tcp() -> RecordingTcp {
    let (connect_tx, connect_rx) = channel();
    let (recv_tx, recv_rx) = channel();
    let (disconnect_tx, disconnect_rx) = channel();
    RecordingTcp {
        handler: Arc::new(RecordingTcpHandler {
            connect_tx,
            recv_tx,
            disconnect_tx,
        }),
        connect_rx,
        recv_rx,
        disconnect_rx,
    }
}

impl TcpHandler for RecordingTcpHandler {
    fn on_connect(&self, sock_id: u32) {
        let _ = self.connect_tx.send(sock_id);
    }

    fn on_recv(&self, sock_id: u32, data: &[u8]) {
        let _ = self.recv_tx.send((sock_id, data.to_vec()));
    }

    fn on_disconnect(&self, sock_id: u32) {
        let _ = self.disconnect_tx.send(sock_id);
    }
}

pub struct RecordingUdpHandler {
    pub recvfrom_tx: Sender<(u32, Vec<u8>, SocketAddr)>,
}

pub struct RecordingUdp {
    pub handler: Arc<RecordingUdpHandler>,
    pub recvfrom_rx: Receiver<(u32, Vec<u8>, SocketAddr)>,
}

pub fn recording_udp() -> RecordingUdp {
    let (recvfrom_tx, recvfrom_rx) = channel();
    RecordingUdp {
        handler: Arc::new(RecordingUdpHandler { recvfrom_tx }),
        recvfrom_rx,
    }
}

impl UdpHandler for RecordingUdpHandler {
    fn on_recvfrom(&self, sock_id: u32, data: &[u8], src: SocketAddr) {
        let _ = self.recvfrom_tx.send((sock_id, data.to_vec(), src));
    }
}
