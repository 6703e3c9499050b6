//! Exchanges over the Unix domain and UDP transports.

use std::net::UdpSocket;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use crate::parser::ShellRequestParser;
use crate::server::ServerOptions;
use crate::transport::{UdpTransport, UnixTransport};

use super::support::{
    CLIENT_TIMEOUT, RunningServer, ServerEvent, SessionEvent, echo_render, round_trip,
    socket_path, test_options,
};

fn udp_server(options: ServerOptions) -> RunningServer {
    RunningServer::start(
        Box::new(UdpTransport::new("127.0.0.1", 0)),
        options,
        Arc::new(ShellRequestParser),
        |server| server.with_render(echo_render()),
    )
}

fn udp_client() -> UdpSocket {
    let client = UdpSocket::bind("127.0.0.1:0").expect("bind client");
    client
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .expect("set read timeout");
    client
}

#[rstest]
fn unix_socket_serves_and_cleans_up() {
    let dir = TempDir::new().expect("temp dir");
    let path = socket_path(&dir, "spindled.sock");
    let server = RunningServer::start(
        Box::new(UnixTransport::new(path.clone())),
        test_options(),
        Arc::new(ShellRequestParser),
        |server| server.with_render(echo_render()),
    );
    assert!(server.address.is_none(), "unix listeners have no inet address");
    assert!(path.exists(), "socket file created on bind");

    let mut client = UnixStream::connect(&path).expect("connect client");
    client
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .expect("set read timeout");
    round_trip(&mut client, "restart 'web 1'", "restart web 1");
    assert!(server.reporter.wait_for(1, |event| *event == ServerEvent::Accepted(0)));

    server.stop().expect("server stops cleanly");
    assert!(!path.exists(), "socket file removed on close");
}

#[rstest]
fn datagrams_are_answered_to_the_sender() {
    let server = udp_server(test_options());
    let address = server.address.expect("udp listener address");
    let client = udp_client();

    client.send_to(b"hello world", address).expect("send datagram");
    let mut reply = [0_u8; 64];
    let (received, from) = client.recv_from(&mut reply).expect("receive reply");

    assert_eq!(from, address);
    assert_eq!(reply.get(..received), Some(&b"hello world"[..]));
    assert!(server.sessions.wait_for(|events| {
        events
            == [
                SessionEvent::Finished {
                    payload: Some(b"hello world".to_vec()),
                    success: true,
                },
                SessionEvent::Dropped,
            ]
    }));
    assert!(server.reporter.wait_for(1, |event| *event == ServerEvent::Dropped(None)));
    assert_eq!(
        server
            .reporter
            .count(|event| matches!(event, ServerEvent::Accepted(_))),
        0,
        "datagrams never occupy a slot"
    );
}

#[rstest]
fn datagrams_are_truncated_to_the_read_length() {
    let server = udp_server(ServerOptions {
        chunk_size: 4,
        ..test_options()
    });
    let address = server.address.expect("udp listener address");
    let client = udp_client();

    client.send_to(b"abcd efgh", address).expect("send datagram");
    let mut reply = [0_u8; 64];
    let (received, _) = client.recv_from(&mut reply).expect("receive reply");

    assert_eq!(reply.get(..received), Some(&b"abcd"[..]));
}
