use std::time::Duration;

use completio::{Config, TcpClient, TcpServer};

mod util;
use util::{init, recording_tcp};

/// Drives more simultaneous connections/sends than a deliberately small
/// `IoContextPool` can hold idle at once. Every echo must still arrive, and
/// `TcpServer`/`TcpClient`'s `Drop` asserts (in debug builds) that no
/// `IoContext` stayed checked out once every socket is gone -- this test's
/// real assertion is that neither `Drop` panics.
#[test]
fn pool_smaller_than_connection_count_does_not_leak_or_drop_data() {
    init();

    const CONNECTIONS: usize = 16;

    let mut small_pool_config = Config::default();
    small_pool_config.io_pool_capacity = 4;
    small_pool_config.sock_pool_idle_capacity = 4;

    let server_side = recording_tcp();
    let mut server = TcpServer::with_config(
        small_pool_config.clone(),
        server_side.handler.clone(),
        Some("127.0.0.1"),
        0,
    )
    .expect("construct server");
    server.start().expect("start server");
    let port = server.local_addr().expect("bound address").port();

    let client_side = recording_tcp();
    let mut client = TcpClient::with_config(small_pool_config, client_side.handler.clone());
    client.start().expect("start client");

    let mut sock_ids = Vec::with_capacity(CONNECTIONS);
    for i in 0..CONNECTIONS {
        let sock_id = client.connect("127.0.0.1", port).expect("connect");
        let payload = format!("message-{i}").into_bytes();
        client.send(sock_id, &payload).expect("client send");
        sock_ids.push((sock_id, payload));
    }

    let mut pending: Vec<(u32, Vec<u8>)> = sock_ids.clone();
    while !pending.is_empty() {
        let (srv_sock_id, data) = server_side
            .recv_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("server did not receive all messages");
        let idx = pending
            .iter()
            .position(|(_, payload)| payload == &data)
            .expect("unexpected payload");
        pending.remove(idx);
        server.send(srv_sock_id, &data).expect("server echo");
    }

    let mut expected: Vec<Vec<u8>> = sock_ids.into_iter().map(|(_, payload)| payload).collect();
    while !expected.is_empty() {
        let (_echoed_sock_id, echoed) = client_side
            .recv_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("client did not receive all echoes");
        let idx = expected
            .iter()
            .position(|payload| payload == &echoed)
            .expect("unexpected echo payload");
        expected.remove(idx);
    }
}
