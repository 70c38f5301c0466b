//! End-to-end scenarios driving a real `net::Server` over loopback sockets.
//!
//! No file in the teacher plays this role (it has no `tests/` directory of
//! its own); `iwismer-rusty-timer`'s `tests/integration/*.rs` convention in
//! the pack is the model for structuring multi-socket scenario tests this
//! way rather than as inline `#[cfg(test)]` modules.

use emberdb::config::Config;
use emberdb::Server;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

fn spawn_master() -> SocketAddr {
    let mut config = Config::default();
    config.port = 0;
    let server = Server::from_config(config).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });
    thread::sleep(Duration::from_millis(50));
    addr
}

fn spawn_replica_of(master: SocketAddr) -> SocketAddr {
    let mut config = Config::default();
    config.port = 0;
    config.replicaof = Some(("127.0.0.1".to_string(), master.port()));
    let server = Server::from_config(config).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

fn send(stream: &mut TcpStream, frame: &[u8]) {
    stream.write_all(frame).unwrap();
}

fn read_n(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

/// Reads until a full CRLF-terminated line has arrived, for replies whose
/// length isn't known up front (e.g. a bulk string's header line).
fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).unwrap();
        out.push(byte[0]);
        if out.ends_with(b"\r\n") {
            return out;
        }
    }
}

#[test]
fn scenario_ping() {
    let addr = spawn_master();
    let mut client = TcpStream::connect(addr).unwrap();
    send(&mut client, b"*1\r\n$4\r\nPING\r\n");
    assert_eq!(read_n(&mut client, 7), b"+PONG\r\n");
}

#[test]
fn scenario_set_get_with_ttl() {
    let addr = spawn_master();
    let mut client = TcpStream::connect(addr).unwrap();

    send(
        &mut client,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$3\r\n100\r\n",
    );
    assert_eq!(read_n(&mut client, 5), b"+OK\r\n");

    send(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    assert_eq!(read_n(&mut client, 7), b"$1\r\nv\r\n");

    thread::sleep(Duration::from_millis(150));
    send(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    assert_eq!(read_n(&mut client, 5), b"$-1\r\n");
}

#[test]
fn scenario_info_replication_on_master() {
    let addr = spawn_master();
    let mut client = TcpStream::connect(addr).unwrap();
    send(&mut client, b"*2\r\n$4\r\nINFO\r\n$11\r\nreplication\r\n");

    let header = read_line(&mut client);
    let header_str = String::from_utf8(header[..header.len() - 2].to_vec()).unwrap();
    let len: usize = header_str.strip_prefix('$').unwrap().parse().unwrap();
    let mut body = read_n(&mut client, len + 2);
    body.truncate(len);
    let body = String::from_utf8(body).unwrap();

    assert!(body.contains("role:master"));
    assert!(body.contains("master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb"));
}

#[test]
fn scenario_replica_handshake() {
    let master = spawn_master();
    let _replica = spawn_replica_of(master);
    thread::sleep(Duration::from_millis(150));

    let mut client = TcpStream::connect(master).unwrap();
    send(&mut client, b"*2\r\n$4\r\nINFO\r\n$11\r\nreplication\r\n");
    let header = read_line(&mut client);
    let header_str = String::from_utf8(header[..header.len() - 2].to_vec()).unwrap();
    let len: usize = header_str.strip_prefix('$').unwrap().parse().unwrap();
    let mut body = read_n(&mut client, len + 2);
    body.truncate(len);
    let body = String::from_utf8(body).unwrap();
    assert!(body.contains("connected_slaves:1"));
}

#[test]
fn scenario_write_propagation_reaches_replica() {
    let master = spawn_master();
    let replica_addr = spawn_replica_of(master);
    thread::sleep(Duration::from_millis(150));

    let mut client = TcpStream::connect(master).unwrap();
    send(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\n1\r\n",
    );
    assert_eq!(read_n(&mut client, 5), b"+OK\r\n");

    thread::sleep(Duration::from_millis(150));

    let mut replica_client = TcpStream::connect(replica_addr).unwrap();
    send(&mut replica_client, b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n");
    assert_eq!(read_n(&mut replica_client, 7), b"$1\r\n1\r\n");
}

#[test]
fn scenario_wait_with_no_replicas_returns_zero() {
    let addr = spawn_master();
    let mut client = TcpStream::connect(addr).unwrap();
    send(&mut client, b"*3\r\n$4\r\nWAIT\r\n$1\r\n1\r\n$3\r\n100\r\n");
    assert_eq!(read_n(&mut client, 4), b":0\r\n");
}

#[test]
fn scenario_wait_returns_count_once_replica_acknowledges() {
    let master = spawn_master();
    let _replica = spawn_replica_of(master);
    thread::sleep(Duration::from_millis(150));

    let mut client = TcpStream::connect(master).unwrap();
    send(&mut client, b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\n1\r\n");
    assert_eq!(read_n(&mut client, 5), b"+OK\r\n");

    send(&mut client, b"*3\r\n$4\r\nWAIT\r\n$1\r\n1\r\n$3\r\n500\r\n");
    assert_eq!(read_n(&mut client, 4), b":1\r\n");
}
