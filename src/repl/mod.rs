//! Replication state, registry, handshake and master-side command handling.

pub mod commands;
pub mod handshake;
pub mod registry;

pub use registry::Registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Fixed 40-char hex replid every EmberDB process reports — the snapshot
/// this crate sends is a canned literal, not a real dump, so there is no
/// reason for the replid to vary run to run.
pub const MASTER_REPLID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

const SNAPSHOT_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

fn hex_decode(hex: &str) -> Vec<u8> {
    let bytes = hex.as_bytes();
    bytes
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16).unwrap();
            let lo = (pair[1] as char).to_digit(16).unwrap();
            ((hi << 4) | lo) as u8
        })
        .collect()
}

/// The fixed 88-byte snapshot payload sent after `+FULLRESYNC`.
pub fn snapshot_bytes() -> &'static [u8] {
    static SNAPSHOT: OnceLock<Vec<u8>> = OnceLock::new();
    SNAPSHOT.get_or_init(|| hex_decode(SNAPSHOT_HEX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationRole {
    Master,
    Replica,
}

/// Per-process replication state, shared via `Arc` once the server starts
/// accepting connections. `role` and `master_replid` are fixed before any
/// thread that shares this state is spawned (the replica handshake, if any,
/// runs to completion first in `main`), so only the fields genuinely touched
/// concurrently afterwards (`master_repl_offset`, the replica `registry`)
/// need interior synchronization.
pub struct ReplicationState {
    pub role: ReplicationRole,
    pub master_replid: String,
    pub master_repl_offset: AtomicU64,
    pub port: u16,
    pub master_host_port: Option<(String, u16)>,
    pub registry: Registry,
}

impl ReplicationState {
    pub fn master(port: u16) -> Self {
        ReplicationState {
            role: ReplicationRole::Master,
            master_replid: MASTER_REPLID.to_string(),
            master_repl_offset: AtomicU64::new(0),
            port,
            master_host_port: None,
            registry: Registry::new(),
        }
    }

    pub fn replica(port: u16, master_host: String, master_port: u16, replid: String, offset: u64) -> Self {
        ReplicationState {
            role: ReplicationRole::Replica,
            master_replid: replid,
            master_repl_offset: AtomicU64::new(offset),
            port,
            master_host_port: Some((master_host, master_port)),
            registry: Registry::new(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.master_repl_offset.load(Ordering::SeqCst)
    }

    pub fn advance_offset(&self, by: u64) -> u64 {
        self.master_repl_offset.fetch_add(by, Ordering::SeqCst) + by
    }

    /// Renders the `INFO replication` payload.
    pub fn info_block(&self) -> String {
        let role = match self.role {
            ReplicationRole::Master => "master",
            ReplicationRole::Replica => "slave",
        };
        format!(
            "role:{role}\r\n\
             connected_slaves:{slaves}\r\n\
             master_replid:{replid}\r\n\
             master_repl_offset:{offset}\r\n\
             second_repl_offset:-1\r\n\
             repl_backlog_active:0\r\n\
             repl_backlog_size:1048576\r\n\
             repl_backlog_first_byte_offset:0\r\n",
            role = role,
            slaves = self.registry.count(),
            replid = self.master_replid,
            offset = self.offset(),
        )
    }
}
