//! Top-level server bring-up: binds the listening socket, spawns one worker
//! thread per accepted connection, and — for a replica — performs the
//! outbound handshake before serving local clients.
//!
//! Grounded on `examples/iGentAI-ferrous/src/network/server.rs`'s `Server`
//! struct (config/store/replication handles bundled together) and its
//! top-level accept loop, but not its sharded non-blocking event loop — this
//! crate replaces that with the simpler thread-per-connection model, which
//! is also exactly how the teacher's own
//! `replication::client::start_background_replication` already runs (a
//! blocking thread).

use super::connection::Connection;
use super::listener::Listener;
use crate::config::Config;
use crate::error::Result;
use crate::repl::{handshake, ReplicationState};
use crate::store::Store;
use std::sync::Arc;
use std::thread;

pub struct Server {
    config: Arc<Config>,
    store: Arc<Store>,
    repl: Arc<ReplicationState>,
    listener: Listener,
}

impl Server {
    pub fn from_config(config: Config) -> Result<Self> {
        let listener = Listener::bind(config.port)?;
        let repl = Arc::new(build_replication_state(&config));
        Ok(Server {
            config: Arc::new(config),
            store: Arc::new(Store::new()),
            repl,
            listener,
        })
    }

    /// The address actually bound — useful when `config.port == 0` asked the
    /// OS to pick an ephemeral one (tests; a real deployment always passes a
    /// concrete `--port`).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the blocking accept loop forever. If this process is a replica,
    /// the outbound handshake and master-command replay loop are started
    /// first, on their own thread, so a slow or failed handshake never
    /// blocks this server from serving its own clients — a failed handshake
    /// is logged and the process continues without a live master link.
    pub fn run(&self) -> Result<()> {
        if let Some((host, port)) = self.config.replicaof.clone() {
            self.spawn_replica_link(host, port);
        }

        loop {
            let (stream, addr) = self.listener.accept()?;
            let store = self.store.clone();
            let repl = self.repl.clone();
            let config = self.config.clone();
            thread::spawn(move || {
                let mut conn = Connection::new(stream, addr);
                if let Err(e) = conn.run(&store, &repl, &config) {
                    eprintln!("connection {} ({}) closed: {}", conn.id, addr, e);
                }
            });
        }
    }

    fn spawn_replica_link(&self, master_host: String, master_port: u16) {
        let store = self.store.clone();
        let repl = self.repl.clone();
        let config = self.config.clone();
        let own_port = self.config.port;
        thread::spawn(move || match handshake::connect_and_handshake(&master_host, master_port, own_port) {
            Ok(outcome) => {
                println!(
                    "handshake with {}:{} complete, replid={}, offset={}",
                    master_host, master_port, outcome.replid, outcome.offset
                );
                handshake::replica_loop(outcome.stream, store, repl, config);
            }
            Err(e) => {
                eprintln!(
                    "handshake with {}:{} failed: {} (continuing as replica with no master link)",
                    master_host, master_port, e
                );
            }
        });
    }
}

fn build_replication_state(config: &Config) -> ReplicationState {
    match &config.replicaof {
        None => ReplicationState::master(config.port),
        Some((host, port)) => {
            // The real replid/offset are only known once the handshake
            // completes; until then this process reports itself with the
            // fixed replid and offset 0, same as a fresh master would, and
            // `spawn_replica_link`'s handshake thread corrects `offset` (via
            // `advance_offset`) once it starts replaying the stream.
            ReplicationState::replica(config.port, host.clone(), *port, crate::repl::MASTER_REPLID.to_string(), 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    #[test]
    fn test_server_serves_ping_over_loopback() {
        let mut config = Config::default();
        config.port = 0;
        let listener = Listener::bind(0).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server {
            config: Arc::new(config),
            store: Arc::new(Store::new()),
            repl: Arc::new(ReplicationState::master(addr.port())),
            listener,
        };

        thread::spawn(move || {
            let _ = server.run();
        });
        thread::sleep(Duration::from_millis(50));

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"+PONG\r\n");
    }
}
