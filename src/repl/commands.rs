//! Master-side `REPLCONF`/`PSYNC` subcommand handling.
//!
//! Grounded on `examples/iGentAI-ferrous/src/replication/commands.rs`'s
//! `handle_replconf`/`handle_psync` subcommand dispatch, narrowed to the
//! subset this dispatcher's table needs: no `CONTINUE` partial resync
//! (replicas here always request `PSYNC ? -1`), no `REPLICAOF`/`SLAVEOF`
//! (replica role is startup-only).

use crate::protocol::Value;
use crate::repl::ReplicationState;

/// `REPLCONF <subcommand> ...` as seen on an ordinary (not-yet-replica)
/// client connection. `ACK` is handled separately by the post-`PSYNC`
/// replica read loop in `net::connection`, since it never carries a reply
/// and only makes sense on a connection already registered as a replica.
pub fn handle_replconf(args: &[Vec<u8>]) -> Value {
    if args.is_empty() {
        return Value::error("ERR", "wrong number of arguments for 'replconf' command");
    }
    let sub = String::from_utf8_lossy(&args[0]).to_uppercase();
    match sub.as_str() {
        "LISTENING-PORT" | "CAPA" => Value::ok(),
        _ => Value::error("ERR", format!("unrecognized REPLCONF subcommand '{}'", sub)),
    }
}

/// The reply pair for a `PSYNC ? -1` from a client that's about to become a
/// replica: the `+FULLRESYNC` line, and the raw snapshot payload to follow
/// it (written via `protocol::write_raw`, not through this `Value`).
pub fn fullresync_reply(state: &ReplicationState) -> Value {
    Value::simple(format!("FULLRESYNC {} 0", state.master_replid))
}

/// Returns `true` if `args` is a well-formed `PSYNC ? -1` request — the
/// only form of `PSYNC` this dispatcher's replicas ever send.
pub fn is_psync_fullresync_request(args: &[Vec<u8>]) -> bool {
    args.len() == 2 && args[0] == b"?" && args[1] == b"-1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_replconf_listening_port() {
        let v = handle_replconf(&[b"listening-port".to_vec(), b"6380".to_vec()]);
        assert_eq!(v, Value::ok());
    }

    #[test]
    fn test_handle_replconf_capa() {
        let v = handle_replconf(&[b"capa".to_vec(), b"psync2".to_vec()]);
        assert_eq!(v, Value::ok());
    }

    #[test]
    fn test_is_psync_fullresync_request() {
        assert!(is_psync_fullresync_request(&[b"?".to_vec(), b"-1".to_vec()]));
        assert!(!is_psync_fullresync_request(&[b"replid".to_vec(), b"0".to_vec()]));
    }

    #[test]
    fn test_fullresync_reply_contains_replid() {
        let state = ReplicationState::master(6379);
        let reply = fullresync_reply(&state);
        match reply {
            Value::SimpleString(s) => assert!(s.starts_with("FULLRESYNC 8371b4fb")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
