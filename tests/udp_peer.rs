use std::time::Duration;

use completio::UdpPeer;

mod util;
use util::{init, recording_udp};

#[test]
fn ephemeral_bind_then_send_to_is_received() {
    init();

    let peer_a_side = recording_udp();
    let mut peer_a = UdpPeer::new(peer_a_side.handler.clone());
    peer_a.start().expect("start peer a");
    let (sock_a, port_a) = peer_a.create(Some("127.0.0.1"), 0).expect("bind peer a");
    assert_ne!(port_a, 0, "ephemeral bind must report the OS-assigned port");

    let peer_b_side = recording_udp();
    let mut peer_b = UdpPeer::new(peer_b_side.handler.clone());
    peer_b.start().expect("start peer b");
    let (sock_b, _port_b) = peer_b.create(Some("127.0.0.1"), 0).expect("bind peer b");

    peer_b
        .send_to(sock_b, b"hello", "127.0.0.1", port_a)
        .expect("send_to");

    let (recv_sock_id, data, _src) = peer_a_side
        .recvfrom_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("peer a did not receive the datagram");
    assert_eq!(recv_sock_id, sock_a);
    assert_eq!(data, b"hello");
}
