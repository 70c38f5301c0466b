//! EmberDB - a small Redis-alike in-memory key/value server with
//! master/replica replication.
//!
//! Entry point: parse CLI flags, build the server from them, run its
//! blocking accept loop forever.

use emberdb::config;
use emberdb::Server;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> emberdb::error::Result<()> {
    let args = config::parse_args().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    let config = config::Config::from(args);

    println!("Starting EmberDB");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    match &config.replicaof {
        Some((host, port)) => println!("Role: replica of {}:{}", host, port),
        None => println!("Role: master"),
    }

    let server = Server::from_config(config)?;
    server.run()
}
