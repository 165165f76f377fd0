use std::time::Duration;

use completio::{TcpClient, TcpServer};

mod util;
use util::{init, recording_tcp};

#[test]
fn peer_initiated_close_is_delivered_with_no_data() {
    init();

    let server_side = recording_tcp();
    let mut server = TcpServer::new(server_side.handler.clone(), Some("127.0.0.1"), 0)
        .expect("construct server");
    server.start().expect("start server");
    let port = server.local_addr().expect("bound address").port();

    let client_side = recording_tcp();
    let mut client = TcpClient::new(client_side.handler.clone());
    client.start().expect("start client");
    let client_sock_id = client.connect("127.0.0.1", port).expect("connect");

    let server_sock_id = server_side
        .connect_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("server did not observe the connection");

    // Closing from the server side should surface as a disconnect on the
    // client, with no zero-length `on_recv` in between.
    server.close_socket(server_sock_id);

    let disconnected_id = client_side
        .disconnect_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("client did not observe the disconnect");
    assert_eq!(disconnected_id, client_sock_id);
    assert!(client_side.recv_rx.try_recv().is_err());
}

#[test]
fn disconnect_is_delivered_at_most_once() {
    init();

    let server_side = recording_tcp();
    let mut server = TcpServer::new(server_side.handler.clone(), Some("127.0.0.1"), 0)
        .expect("construct server");
    server.start().expect("start server");
    let port = server.local_addr().expect("bound address").port();

    let client_side = recording_tcp();
    let mut client = TcpClient::new(client_side.handler.clone());
    client.start().expect("start client");
    let client_sock_id = client.connect("127.0.0.1", port).expect("connect");

    let server_sock_id = server_side
        .connect_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("server did not observe the connection");

    server.close_socket(server_sock_id);

    client_side
        .disconnect_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("client did not observe the first disconnect");

    // A closed socket is a dead handle from here on: further client-side
    // closes must be harmless no-ops, not a second callback.
    client.close_socket(client_sock_id);
    assert!(client_side
        .disconnect_rx
        .recv_timeout(Duration::from_millis(300))
        .is_err());
}
