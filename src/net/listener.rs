//! TCP listener for accepting client connections.
//!
//! Grounded on `examples/iGentAI-ferrous/src/network/listener.rs`'s
//! `Listener::bind`/`accept`, with non-blocking mode dropped: this crate's
//! accept loop blocks, per the thread-per-connection model.

use crate::error::{EmberError, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};

pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub fn bind(port: u16) -> Result<Self> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&addr)
            .map_err(|e| EmberError::Io(format!("failed to bind to {}: {}", addr, e)))?;
        println!("EmberDB listening on {}", addr);
        Ok(Listener { listener })
    }

    /// Blocks until a client connects.
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        self.listener.accept().map_err(Into::into)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}
