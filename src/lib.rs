//! EmberDB library
//!
//! A small in-memory key/value server that speaks a line-oriented,
//! length-prefixed request/response protocol and participates in a
//! single-master/many-replica replication topology.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod net;
pub mod protocol;
pub mod repl;
pub mod store;

pub use config::Config;
pub use error::EmberError;
pub use net::Server;
pub use protocol::Value;
