//! Per-client connection: the request loop that turns decoded frames into
//! dispatcher calls, and the write side of the replica-handshake upgrade.
//!
//! Grounded on `examples/iGentAI-ferrous/src/network/connection.rs`'s
//! `Connection` struct (kept the field shape: id, stream, addr, parser,
//! write buffer) with non-blocking mode dropped — this crate's sockets
//! block, per the thread-per-connection model.

use crate::config::Config;
use crate::dispatch;
use crate::error::{EmberError, Result};
use crate::protocol::{decoder::Decoder, encode_to_vec, write_raw, Value};
use crate::repl::{commands as replcmd, ReplicationState};
use crate::store::Store;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static CONN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    pub id: u64,
    stream: TcpStream,
    pub addr: SocketAddr,
    decoder: Decoder,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let id = CONN_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        let _ = stream.set_nodelay(true);
        Connection { id, stream, addr, decoder: Decoder::new() }
    }

    fn read_frame(&mut self) -> Result<Option<Value>> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(value) = self.decoder.next_frame()? {
                return Ok(Some(value));
            }
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.decoder.feed(&buf[..n]),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        let bytes = encode_to_vec(value)?;
        self.stream.write_all(&bytes).map_err(EmberError::from)
    }

    /// Runs the client request loop: decode → classify → execute → reply.
    /// On a `SET`/`XADD` write, propagates the original frame to replicas and
    /// advances `master_repl_offset` before moving on to the next command.
    /// Returns normally on EOF (a normal close, not an error); returns an
    /// error on a decode failure or I/O failure, which the caller treats as
    /// "close the connection".
    pub fn run(
        &mut self,
        store: &Arc<Store>,
        repl: &Arc<ReplicationState>,
        config: &Arc<Config>,
    ) -> Result<()> {
        loop {
            let frame = match self.read_frame()? {
                Some(frame) => frame,
                None => return Ok(()),
            };

            let (command, args) = match frame.as_command() {
                Some(parsed) => parsed,
                None => {
                    return Err(EmberError::Protocol(
                        "expected an array of bulk strings as a command".into(),
                    ))
                }
            };

            if command == "PSYNC" && replcmd::is_psync_fullresync_request(&args) {
                self.become_replica(repl)?;
                return Ok(());
            }

            if command == "REPLCONF" && args.first().map(|a| a.eq_ignore_ascii_case(b"ACK")).unwrap_or(false) {
                // A plain client connection never legitimately sends ACK
                // (only a promoted replica connection does, and that
                // connection's loop lives in `become_replica` below, not
                // here) — ignore rather than error, matching the "no reply"
                // rule for ACK.
                continue;
            }

            let (reply, is_write) = dispatch::execute(&command, &args, store, repl, config);

            if is_write {
                if let Ok(bytes) = encode_to_vec(&frame) {
                    repl.registry.propagate(&bytes);
                    repl.advance_offset(bytes.len() as u64);
                }
            }

            self.write_value(&reply)?;
        }
    }

    /// Completes the master side of the handshake on a connection that
    /// just sent `PSYNC ? -1`: reply `+FULLRESYNC`, send the snapshot, then
    /// hand the socket to the registry and keep reading `REPLCONF ACK`
    /// frames off it for as long as the replica stays up.
    fn become_replica(&mut self, repl: &Arc<ReplicationState>) -> Result<()> {
        self.write_value(&replcmd::fullresync_reply(repl))?;
        write_raw(crate::repl::snapshot_bytes(), &mut self.stream)?;

        let stream_clone = self.stream.try_clone().map_err(EmberError::from)?;
        let handle = repl.registry.add(self.id, stream_clone);
        println!("replica connected: {}", self.addr);

        loop {
            let frame = match self.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    eprintln!("replica connection {} protocol error: {}", self.id, e);
                    break;
                }
            };
            if let Some((cmd, args)) = frame.as_command() {
                if cmd == "REPLCONF" && args.first().map(|a| a.eq_ignore_ascii_case(b"ACK")).unwrap_or(false) {
                    if let Some(offset_bytes) = args.get(1) {
                        if let Ok(offset) = String::from_utf8_lossy(offset_bytes).parse::<u64>() {
                            handle.record_ack(offset);
                        }
                    }
                }
            }
        }

        repl.registry.remove(self.id);
        println!("replica disconnected: {}", self.addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::ReplicationState;
    use std::net::TcpListener;

    fn connected_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, peer_addr) = listener.accept().unwrap();
        (Connection::new(server_side, peer_addr), client)
    }

    #[test]
    fn test_ping_round_trip() {
        let (mut conn, mut client) = connected_pair();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        let store = Arc::new(Store::new());
        let repl = Arc::new(ReplicationState::master(6379));
        let config = Arc::new(Config::default());
        conn.run(&store, &repl, &config).unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"+PONG\r\n");
    }

    #[test]
    fn test_protocol_error_closes_connection() {
        let (mut conn, mut client) = connected_pair();
        client.write_all(b"!oops\r\n").unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        let store = Arc::new(Store::new());
        let repl = Arc::new(ReplicationState::master(6379));
        let config = Arc::new(Config::default());
        assert!(conn.run(&store, &repl, &config).is_err());
    }
}
