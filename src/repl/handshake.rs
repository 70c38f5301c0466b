//! Replica-side outbound handshake and master-command replay loop.
//!
//! Grounded on `examples/iGentAI-ferrous/src/replication/client.rs`'s
//! `perform_handshake`/`perform_initial_sync`/`continuous_replication`/
//! `process_replication_command`, with three corrections the teacher does
//! differently from this spec: the snapshot frame here has no trailing
//! CRLF (the teacher's RDB transfer expects and validates one), the replay
//! offset advances by encoded frame *byte length* rather than a flat `+1`
//! per command, and `REPLCONF GETACK *` is answered specifically rather
//! than folded into a generic periodic-ACK timer. The AUTH handshake stage
//! the teacher performs is dropped — authentication is out of scope.

use crate::config::Config;
use crate::dispatch;
use crate::error::{EmberError, Result};
use crate::protocol::{decoder::Decoder, encode_to_vec, Value};
use crate::repl::ReplicationState;
use crate::store::Store;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

/// Successful handshake outcome: the stream (still open, positioned right
/// after the discarded snapshot) plus what the replica learned.
pub struct HandshakeOutcome {
    pub stream: BufReader<TcpStream>,
    pub replid: String,
    pub offset: u64,
}

/// Runs the three-stage ladder (PING, REPLCONF x2, PSYNC) against
/// `master_host:master_port`, advertising `own_port` via
/// `REPLCONF listening-port`.
pub fn connect_and_handshake(
    master_host: &str,
    master_port: u16,
    own_port: u16,
) -> Result<HandshakeOutcome> {
    let stream = TcpStream::connect((master_host, master_port))
        .map_err(|e| EmberError::Handshake(format!("connect failed: {}", e)))?;
    let mut reader = BufReader::new(stream);

    send_command(&mut reader, &[b"PING"])?;
    expect_simple(&mut reader, "PONG")?;

    send_command(&mut reader, &[b"REPLCONF", b"listening-port", own_port.to_string().as_bytes()])?;
    expect_simple(&mut reader, "OK")?;

    send_command(&mut reader, &[b"REPLCONF", b"capa", b"psync2"])?;
    expect_simple(&mut reader, "OK")?;

    send_command(&mut reader, &[b"PSYNC", b"?", b"-1"])?;
    let line = read_line(&mut reader)?;
    let text = line
        .strip_prefix('+')
        .ok_or_else(|| EmberError::Handshake(format!("expected +FULLRESYNC, got: {}", line)))?;
    let mut parts = text.split_whitespace();
    match parts.next() {
        Some("FULLRESYNC") => {}
        _ => return Err(EmberError::Handshake(format!("unexpected PSYNC reply: {}", text))),
    }
    let replid = parts
        .next()
        .ok_or_else(|| EmberError::Handshake("missing replid in FULLRESYNC".into()))?
        .to_string();
    let offset: u64 = parts
        .next()
        .ok_or_else(|| EmberError::Handshake("missing offset in FULLRESYNC".into()))?
        .parse()
        .map_err(|_| EmberError::Handshake("non-integer offset in FULLRESYNC".into()))?;

    // Snapshot frame: "$<len>\r\n<bytes>" with no trailing CRLF. Discard.
    let header = read_line(&mut reader)?;
    let len_str = header
        .strip_prefix('$')
        .ok_or_else(|| EmberError::Handshake(format!("expected snapshot header, got: {}", header)))?;
    let len: usize = len_str
        .parse()
        .map_err(|_| EmberError::Handshake("invalid snapshot length".into()))?;
    let mut discard = vec![0u8; len];
    reader
        .read_exact(&mut discard)
        .map_err(|e| EmberError::Handshake(format!("failed reading snapshot body: {}", e)))?;

    Ok(HandshakeOutcome { stream: reader, replid, offset })
}

fn send_command(reader: &mut BufReader<TcpStream>, parts: &[&[u8]]) -> Result<()> {
    let frame = Value::array(parts.iter().map(|p| Value::bulk(p.to_vec())).collect());
    let bytes = encode_to_vec(&frame)?;
    reader.get_mut().write_all(&bytes)?;
    Ok(())
}

/// Reads one CRLF-terminated line (without the trailing CRLF) as text.
fn read_line(reader: &mut BufReader<TcpStream>) -> Result<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(EmberError::Handshake("connection closed during handshake".into()));
    }
    while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn expect_simple(reader: &mut BufReader<TcpStream>, expected: &str) -> Result<()> {
    let line = read_line(reader)?;
    if line == format!("+{}", expected) {
        Ok(())
    } else {
        Err(EmberError::Handshake(format!(
            "expected +{}, got: {}",
            expected, line
        )))
    }
}

/// After a successful handshake, replays the master's command stream
/// forever: execute every command through the same dispatch table the
/// client-facing connection loop uses (so `XADD` and any future write
/// command replicate exactly like `SET`), reply only to
/// `REPLCONF GETACK *`, then advance `master_repl_offset` by the frame's
/// encoded byte length regardless of whether a reply was sent.
pub fn replica_loop(
    mut reader: BufReader<TcpStream>,
    store: Arc<Store>,
    repl: Arc<ReplicationState>,
    config: Arc<Config>,
) {
    let mut decoder = Decoder::new();
    let mut buf = [0u8; 4096];

    loop {
        let frame = loop {
            match decoder.next_frame() {
                Ok(Some(value)) => break value,
                Ok(None) => {}
                Err(e) => {
                    eprintln!("replication stream protocol error: {}", e);
                    return;
                }
            }
            match reader.read(&mut buf) {
                Ok(0) => {
                    println!("master connection closed");
                    return;
                }
                Ok(n) => decoder.feed(&buf[..n]),
                Err(e) => {
                    eprintln!("replication stream read error: {}", e);
                    return;
                }
            }
        };

        let frame_len = match encode_to_vec(&frame) {
            Ok(bytes) => bytes.len() as u64,
            Err(_) => 0,
        };

        if let Some((cmd, args)) = frame.as_command() {
            if cmd == "REPLCONF" && args.first().map(|a| a.eq_ignore_ascii_case(b"GETACK")).unwrap_or(false) {
                let ack = Value::array(vec![
                    "REPLCONF".into(),
                    "ACK".into(),
                    repl.offset().to_string().into(),
                ]);
                if let Ok(bytes) = encode_to_vec(&ack) {
                    if reader.get_mut().write_all(&bytes).is_err() {
                        return;
                    }
                }
            } else {
                let _ = dispatch::execute(&cmd, &args, &store, &repl, &config);
            }
        }

        repl.advance_offset(frame_len);
    }
}
