//! Client-facing command dispatcher: classify → execute → reply.
//!
//! Grounded on the Go reference's `redis_server.go` `ResponseFromArgs`
//! dispatch — the PING/ECHO/GET/SET/INFO/REPLCONF handlers there
//! (`response<CMD>` naming) map almost 1:1 onto this table, and
//! `responseINFO`'s category validation is the source for `cmd_info`'s
//! error text below. `PSYNC` and a `REPLCONF ACK` are not handled here —
//! both change the connection's role or meaning and are intercepted
//! directly by `net::connection` before a frame ever reaches `execute`.
//! Every other `REPLCONF` subcommand (`listening-port`, `capa`, seen during
//! the handshake ladder) falls through to the ordinary command table here.

use crate::config::Config;
use crate::error::CommandError;
use crate::protocol::Value;
use crate::repl::{commands as replcmd, ReplicationState};
use crate::store::{Lookup, Store, StreamEntry};

/// Runs one command. The returned `bool` is "this was a write" — the
/// caller (the connection's request loop) uses it to drive propagation and
/// `master_repl_offset` advance before moving on to the next command.
pub fn execute(
    cmd: &str,
    args: &[Vec<u8>],
    store: &Store,
    repl: &ReplicationState,
    config: &Config,
) -> (Value, bool) {
    match cmd {
        "PING" => (Value::simple("PONG"), false),
        "ECHO" => cmd_echo(args),
        "GET" => cmd_get(args, store),
        "SET" => cmd_set(args, store),
        "INFO" => cmd_info(args, repl),
        "TYPE" => cmd_type(args, store),
        "XADD" => cmd_xadd(args, store),
        "CONFIG" => cmd_config(args, config),
        "WAIT" => cmd_wait(args, repl),
        "REPLCONF" => (replcmd::handle_replconf(args), false),
        other => (command_error(CommandError::UnknownCommand(other.to_string())), false),
    }
}

/// Renders a `CommandError` as the wire `SimpleError` it names (a
/// `CommandError`'s `Display` impl *is* the wire message). Every command
/// handler below goes through this rather than hand-building `Value::error`
/// literals, so the wire text and the `CommandError` enum can never drift
/// apart.
fn command_error(err: CommandError) -> Value {
    let text = err.to_string();
    match text.split_once(' ') {
        Some((kind, message)) => Value::error(kind, message),
        None => Value::error(text, ""),
    }
}

fn arity_error(cmd: &str) -> Value {
    command_error(CommandError::WrongArity(cmd.to_string()))
}

fn cmd_echo(args: &[Vec<u8>]) -> (Value, bool) {
    if args.len() != 1 {
        return (arity_error("echo"), false);
    }
    (Value::bulk(args[0].clone()), false)
}

fn cmd_get(args: &[Vec<u8>], store: &Store) -> (Value, bool) {
    if args.len() != 1 {
        return (arity_error("get"), false);
    }
    let key = String::from_utf8_lossy(&args[0]);
    match store.get(&key) {
        Lookup::Value(bytes) => (Value::bulk(bytes), false),
        Lookup::Absent => (Value::NullBulkString, false),
        Lookup::WrongType => (command_error(CommandError::WrongType), false),
    }
}

fn cmd_set(args: &[Vec<u8>], store: &Store) -> (Value, bool) {
    if args.len() < 2 {
        return (arity_error("set"), false);
    }
    let key = String::from_utf8_lossy(&args[0]).into_owned();
    let value = args[1].clone();

    let mut expiry_ms = crate::store::NO_EXPIRY;
    let mut i = 2;
    while i < args.len() {
        if args[i].eq_ignore_ascii_case(b"PX") {
            if i + 1 >= args.len() {
                return (command_error(CommandError::SyntaxError(String::new())), false);
            }
            match String::from_utf8_lossy(&args[i + 1]).parse::<i64>() {
                Ok(ms) => expiry_ms = ms,
                Err(_) => return (command_error(CommandError::NotInteger), false),
            }
            i += 2;
        } else {
            return (command_error(CommandError::SyntaxError(String::new())), false);
        }
    }

    store.set(key, value, expiry_ms);
    (Value::ok(), true)
}

fn cmd_info(args: &[Vec<u8>], repl: &ReplicationState) -> (Value, bool) {
    if args.len() != 1 {
        return (arity_error("info"), false);
    }
    let category = String::from_utf8_lossy(&args[0]).to_lowercase();
    match category.as_str() {
        "replication" => (Value::bulk(repl.info_block()), false),
        _ => (
            Value::error("info error", "failed to specify a valid info error"),
            false,
        ),
    }
}

fn cmd_type(args: &[Vec<u8>], store: &Store) -> (Value, bool) {
    if args.len() != 1 {
        return (arity_error("type"), false);
    }
    let key = String::from_utf8_lossy(&args[0]);
    (Value::simple(store.type_of(&key)), false)
}

fn cmd_xadd(args: &[Vec<u8>], store: &Store) -> (Value, bool) {
    if args.len() < 4 || (args.len() - 2) % 2 != 0 {
        return (arity_error("xadd"), false);
    }
    let key = String::from_utf8_lossy(&args[0]).into_owned();
    let id = String::from_utf8_lossy(&args[1]).into_owned();
    let mut fields = Vec::new();
    let mut i = 2;
    while i + 1 < args.len() {
        let field = String::from_utf8_lossy(&args[i]).into_owned();
        let value = String::from_utf8_lossy(&args[i + 1]).into_owned();
        fields.push((field, value));
        i += 2;
    }
    match store.append_stream(&key, StreamEntry::new(id.clone(), fields)) {
        Ok(()) => (Value::simple(id), true),
        Err(()) => (command_error(CommandError::WrongType), false),
    }
}

fn cmd_config(args: &[Vec<u8>], config: &Config) -> (Value, bool) {
    if args.len() != 2 || !args[0].eq_ignore_ascii_case(b"GET") {
        return (arity_error("config"), false);
    }
    let name = String::from_utf8_lossy(&args[1]).to_lowercase();
    let value = match name.as_str() {
        "dir" => Some(config.dir.clone()),
        "dbfilename" => Some(config.dbfilename.clone()),
        _ => None,
    };
    match value {
        Some(v) => (Value::array(vec![Value::bulk(name), Value::bulk(v)]), false),
        None => (Value::array(vec![]), false),
    }
}

fn cmd_wait(args: &[Vec<u8>], repl: &ReplicationState) -> (Value, bool) {
    if args.len() != 2 {
        return (arity_error("wait"), false);
    }
    let need: usize = match String::from_utf8_lossy(&args[0]).parse() {
        Ok(n) => n,
        Err(_) => return (command_error(CommandError::NotInteger), false),
    };
    let timeout_ms: u64 = match String::from_utf8_lossy(&args[1]).parse() {
        Ok(t) => t,
        Err(_) => return (command_error(CommandError::NotInteger), false),
    };
    let target = repl.offset();
    let synced = repl.registry.wait(need, timeout_ms, target);
    (Value::Integer(synced as i64), false)
}
