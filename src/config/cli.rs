//! Command-line argument parser.
//!
//! Grounded on `examples/iGentAI-ferrous/src/config/cli.rs`'s
//! `parse_cli_args` (same `while i < args.len()` loop, same
//! `match args[i].as_str()` dispatch, same `eprintln!` + `process::exit(1)`
//! convention on bad input), narrowed to the four flags this server reads.

use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct Args {
    pub port: Option<u16>,
    pub replicaof: Option<(String, u16)>,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("missing argument for {0}")]
    MissingArgument(String),
    #[error("invalid port number: {0}")]
    InvalidPort(String),
    #[error("invalid --replicaof value: {0}")]
    InvalidReplicaof(String),
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Parses `std::env::args()` (skipping argv[0]) into `Args`, or an error
/// describing the first malformed flag.
pub fn parse_args() -> Result<Args, CliParseError> {
    parse_from(std::env::args().skip(1).collect())
}

fn parse_from(argv: Vec<String>) -> Result<Args, CliParseError> {
    let mut args = Args::default();
    let mut i = 0;

    while i < argv.len() {
        match argv[i].as_str() {
            "--port" => {
                let raw = next_value(&argv, i, "--port")?;
                args.port = Some(
                    raw.parse::<u16>()
                        .map_err(|_| CliParseError::InvalidPort(raw.clone()))?,
                );
                i += 2;
            }
            "--replicaof" => {
                if i + 2 >= argv.len() {
                    return Err(CliParseError::MissingArgument("--replicaof".into()));
                }
                let host = argv[i + 1].clone();
                let port = argv[i + 2]
                    .parse::<u16>()
                    .map_err(|_| CliParseError::InvalidReplicaof(argv[i + 2].clone()))?;
                args.replicaof = Some((host, port));
                i += 3;
            }
            "--dir" => {
                args.dir = Some(next_value(&argv, i, "--dir")?.clone());
                i += 2;
            }
            "--dbfilename" => {
                args.dbfilename = Some(next_value(&argv, i, "--dbfilename")?.clone());
                i += 2;
            }
            other => return Err(CliParseError::UnknownArgument(other.to_string())),
        }
    }

    Ok(args)
}

fn next_value<'a>(argv: &'a [String], i: usize, flag: &str) -> Result<&'a String, CliParseError> {
    argv.get(i + 1)
        .ok_or_else(|| CliParseError::MissingArgument(flag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_port() {
        let args = parse_from(strs(&["--port", "7000"])).unwrap();
        assert_eq!(args.port, Some(7000));
    }

    #[test]
    fn test_parse_replicaof() {
        let args = parse_from(strs(&["--replicaof", "localhost", "6379"])).unwrap();
        assert_eq!(args.replicaof, Some(("localhost".to_string(), 6379)));
    }

    #[test]
    fn test_parse_dir_and_dbfilename() {
        let args = parse_from(strs(&["--dir", "/tmp", "--dbfilename", "dump.rdb"])).unwrap();
        assert_eq!(args.dir, Some("/tmp".to_string()));
        assert_eq!(args.dbfilename, Some("dump.rdb".to_string()));
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = parse_from(strs(&["--port", "notanumber"])).unwrap_err();
        assert!(matches!(err, CliParseError::InvalidPort(_)));
    }

    #[test]
    fn test_unknown_flag_is_error() {
        let err = parse_from(strs(&["--bogus"])).unwrap_err();
        assert!(matches!(err, CliParseError::UnknownArgument(_)));
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = parse_from(strs(&["--port"])).unwrap_err();
        assert!(matches!(err, CliParseError::MissingArgument(_)));
    }
}
