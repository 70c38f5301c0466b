//! Error types for EmberDB
//!
//! We follow Redis's error text conventions where applicable: a `Display`
//! impl on `CommandError` doubles as the wire error message.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Main error type for EmberDB operations
#[derive(Debug)]
pub enum EmberError {
    /// Malformed wire frame. Closes the connection.
    Protocol(String),

    /// Command execution error. Replied inline, connection stays open.
    Command(CommandError),

    /// Socket read/write failure. Closes the affected connection.
    Io(String),

    /// Handshake ladder mismatch while connecting to a master.
    Handshake(String),

    /// Startup configuration error.
    Config(String),
}

/// Command-specific errors that map to Redis-style error replies.
#[derive(Debug, Clone)]
pub enum CommandError {
    UnknownCommand(String),
    WrongArity(String),
    NotInteger,
    SyntaxError(String),
    WrongType,
}

pub type Result<T> = std::result::Result<T, EmberError>;

impl fmt::Display for EmberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmberError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            EmberError::Command(err) => write!(f, "{}", err),
            EmberError::Io(msg) => write!(f, "I/O error: {}", msg),
            EmberError::Handshake(msg) => write!(f, "Handshake error: {}", msg),
            EmberError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand(cmd) => {
                write!(f, "ERR unknown command '{}'", cmd)
            }
            CommandError::WrongArity(cmd) => {
                write!(f, "ERR wrong number of arguments for '{}' command", cmd)
            }
            CommandError::NotInteger => {
                write!(f, "ERR value is not an integer or out of range")
            }
            CommandError::SyntaxError(msg) if msg.is_empty() => write!(f, "ERR syntax error"),
            CommandError::SyntaxError(msg) => write!(f, "ERR syntax error: {}", msg),
            CommandError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
        }
    }
}

impl StdError for EmberError {}
impl StdError for CommandError {}

impl From<io::Error> for EmberError {
    fn from(err: io::Error) -> Self {
        EmberError::Io(err.to_string())
    }
}

impl From<CommandError> for EmberError {
    fn from(err: CommandError) -> Self {
        EmberError::Command(err)
    }
}
