use std::time::Duration;

use completio::{TcpClient, TcpServer};

mod util;
use util::{init, recording_tcp};

#[test]
fn echoes_a_single_message_round_trip() {
    init();

    let server_side = recording_tcp();
    let mut server = TcpServer::new(server_side.handler.clone(), Some("127.0.0.1"), 0)
        .expect("construct server");
    server.start().expect("start server");
    let port = server.local_addr().expect("bound address").port();

    let client_side = recording_tcp();
    let mut client = TcpClient::new(client_side.handler.clone());
    client.start().expect("start client");
    let sock_id = client.connect("127.0.0.1", port).expect("connect");

    client.send(sock_id, b"ping").expect("client send");

    let (srv_sock_id, data) = server_side
        .recv_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("server did not receive data");
    assert_eq!(data, b"ping");

    server.send(srv_sock_id, &data).expect("server echo");

    let (echoed_sock_id, echoed) = client_side
        .recv_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("client did not receive echo");
    assert_eq!(echoed_sock_id, sock_id);
    assert_eq!(echoed, b"ping");
}

#[test]
fn server_sees_on_connect_before_any_data() {
    init();

    let server_side = recording_tcp();
    let mut server = TcpServer::new(server_side.handler.clone(), Some("127.0.0.1"), 0)
        .expect("construct server");
    server.start().expect("start server");
    let port = server.local_addr().expect("bound address").port();

    let client_side = recording_tcp();
    let mut client = TcpClient::new(client_side.handler.clone());
    client.start().expect("start client");
    let _sock_id = client.connect("127.0.0.1", port).expect("connect");

    server_side
        .connect_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("server did not observe the connection");
}
