//! Dual encoder for the wire protocol.

use super::value::Value;
use crate::error::Result;
use std::io::Write;

/// Encode a value to a writer.
pub fn encode_value<W: Write>(value: &Value, writer: &mut W) -> Result<()> {
    match value {
        Value::SimpleString(s) => {
            writer.write_all(b"+")?;
            writer.write_all(s.as_bytes())?;
            writer.write_all(b"\r\n")?;
        }
        Value::SimpleError { kind, message } => {
            writer.write_all(b"-")?;
            writer.write_all(kind.as_bytes())?;
            if !message.is_empty() {
                writer.write_all(b" ")?;
                writer.write_all(message.as_bytes())?;
            }
            writer.write_all(b"\r\n")?;
        }
        Value::Integer(n) => {
            writer.write_all(b":")?;
            writer.write_all(n.to_string().as_bytes())?;
            writer.write_all(b"\r\n")?;
        }
        Value::BulkString(bytes) => {
            writer.write_all(b"$")?;
            writer.write_all(bytes.len().to_string().as_bytes())?;
            writer.write_all(b"\r\n")?;
            writer.write_all(bytes)?;
            writer.write_all(b"\r\n")?;
        }
        Value::NullBulkString => {
            writer.write_all(b"$-1\r\n")?;
        }
        Value::Null => {
            writer.write_all(b"_\r\n")?;
        }
        Value::Array(items) => {
            writer.write_all(b"*")?;
            writer.write_all(items.len().to_string().as_bytes())?;
            writer.write_all(b"\r\n")?;
            for item in items {
                encode_value(item, writer)?;
            }
        }
        Value::RawString(bytes) => {
            // Dedicated raw path; see `write_raw` below. Reaching here from
            // the generic encoder would silently drop framing, so callers
            // that build a `RawString` into a larger `Array` are a bug —
            // the snapshot frame is always written standalone.
            writer.write_all(bytes)?;
        }
    }
    Ok(())
}

pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value(value, &mut buf)?;
    Ok(buf)
}

/// Write a raw, unframed byte payload as a bulk-string header with no
/// trailing CRLF — the snapshot frame's exact shape (spec: `$<len>CRLF<bytes>`
/// with no CRLF after the bytes). Kept off the general `Value` encode path
/// per design note: a `RawString` variant exists in the value union only so
/// callers can represent "I have unframed bytes to send", but the framing
/// itself is written here, once, rather than folded into every match arm.
pub fn write_raw<W: Write>(payload: &[u8], writer: &mut W) -> Result<()> {
    writer.write_all(b"$")?;
    writer.write_all(payload.len().to_string().as_bytes())?;
    writer.write_all(b"\r\n")?;
    writer.write_all(payload)?;
    Ok(())
}
