//! Incremental, resumable decoder for the wire protocol.
//!
//! `Decoder` accumulates bytes fed to it and yields complete top-level
//! frames as they become available. If the buffer is exhausted mid-frame it
//! reports "need more input" rather than erroring, so a caller can read more
//! bytes off the socket and retry.

use super::value::Value;
use crate::error::{EmberError, Result};

pub struct Decoder {
    buffer: Vec<u8>,
    position: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            buffer: Vec::with_capacity(4096),
            position: 0,
        }
    }

    /// Feed newly-read bytes into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode one complete top-level frame from the buffer.
    pub fn next_frame(&mut self) -> Result<Option<Value>> {
        if self.position >= self.buffer.len() {
            return Ok(None);
        }

        match parse_frame(&self.buffer[self.position..])? {
            Some((value, consumed)) => {
                self.position += consumed;
                if self.position > self.buffer.len() / 2 {
                    self.buffer.drain(..self.position);
                    self.position = 0;
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a single frame from a byte slice, for use outside the stateful
/// `Decoder` (e.g. the handshake ladder, which reads one reply at a time off
/// a blocking stream into its own small buffer).
pub fn decode_one(data: &[u8]) -> Result<Option<(Value, usize)>> {
    parse_frame(data)
}

fn parse_frame(data: &[u8]) -> Result<Option<(Value, usize)>> {
    if data.is_empty() {
        return Ok(None);
    }

    match data[0] {
        b'+' => parse_simple_string(data),
        b'-' => parse_error(data),
        b':' => parse_integer(data),
        b'$' => parse_bulk_string(data),
        b'*' => parse_array(data),
        b'_' => parse_null(data),
        other => Err(EmberError::Protocol(format!(
            "invalid type byte: {}",
            other as char
        ))),
    }
}

fn parse_simple_string(data: &[u8]) -> Result<Option<(Value, usize)>> {
    Ok(parse_line(data, 1)?.map(|(line, consumed)| {
        (Value::SimpleString(String::from_utf8_lossy(line).into_owned()), consumed)
    }))
}

fn parse_error(data: &[u8]) -> Result<Option<(Value, usize)>> {
    let (line, consumed) = match parse_line(data, 1)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let text = String::from_utf8_lossy(line);
    let (kind, message) = match text.split_once(' ') {
        Some((k, m)) => (k.to_string(), m.to_string()),
        None => (text.into_owned(), String::new()),
    };
    Ok(Some((Value::SimpleError { kind, message }, consumed)))
}

fn parse_integer(data: &[u8]) -> Result<Option<(Value, usize)>> {
    let (line, consumed) = match parse_line(data, 1)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let s = std::str::from_utf8(line)
        .map_err(|_| EmberError::Protocol("invalid UTF-8 in integer".into()))?;
    let n = s
        .parse::<i64>()
        .map_err(|_| EmberError::Protocol("invalid integer format".into()))?;
    Ok(Some((Value::Integer(n), consumed)))
}

fn parse_bulk_string(data: &[u8]) -> Result<Option<(Value, usize)>> {
    let (len_line, header_consumed) = match parse_line(data, 1)? {
        Some(v) => v,
        None => return Ok(None),
    };

    let len_str = std::str::from_utf8(len_line)
        .map_err(|_| EmberError::Protocol("invalid UTF-8 in bulk length".into()))?;
    let len = len_str
        .parse::<i64>()
        .map_err(|_| EmberError::Protocol("invalid bulk string length".into()))?;

    if len == -1 {
        return Ok(Some((Value::NullBulkString, header_consumed)));
    }
    if len < 0 {
        return Err(EmberError::Protocol("negative bulk string length".into()));
    }

    let len = len as usize;
    let total_needed = header_consumed + len + 2;
    if data.len() < total_needed {
        return Ok(None);
    }

    if data[header_consumed + len] != b'\r' || data[header_consumed + len + 1] != b'\n' {
        return Err(EmberError::Protocol("missing CRLF after bulk string".into()));
    }

    let content = data[header_consumed..header_consumed + len].to_vec();
    Ok(Some((Value::BulkString(content), total_needed)))
}

fn parse_array(data: &[u8]) -> Result<Option<(Value, usize)>> {
    let (len_line, header_consumed) = match parse_line(data, 1)? {
        Some(v) => v,
        None => return Ok(None),
    };

    let len_str = std::str::from_utf8(len_line)
        .map_err(|_| EmberError::Protocol("invalid UTF-8 in array length".into()))?;
    let len = len_str
        .parse::<i64>()
        .map_err(|_| EmberError::Protocol("invalid array length".into()))?;

    if len < 0 {
        return Err(EmberError::Protocol("negative array length".into()));
    }

    let len = len as usize;
    let mut elements = Vec::with_capacity(len);
    let mut total_consumed = header_consumed;

    for _ in 0..len {
        match parse_frame(&data[total_consumed..])? {
            Some((value, consumed)) => {
                elements.push(value);
                total_consumed += consumed;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Value::Array(elements), total_consumed)))
}

fn parse_null(data: &[u8]) -> Result<Option<(Value, usize)>> {
    if data.len() < 3 {
        return Ok(None);
    }
    if data[1] == b'\r' && data[2] == b'\n' {
        Ok(Some((Value::Null, 3)))
    } else {
        Err(EmberError::Protocol("invalid null format".into()))
    }
}

fn parse_line(data: &[u8], skip_prefix: usize) -> Result<Option<(&[u8], usize)>> {
    if data.len() < skip_prefix + 2 {
        return Ok(None);
    }
    for i in skip_prefix..data.len() - 1 {
        if data[i] == b'\r' && data[i + 1] == b'\n' {
            return Ok(Some((&data[skip_prefix..i], i + 2)));
        }
    }
    Ok(None)
}
