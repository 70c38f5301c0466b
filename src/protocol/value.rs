//! The tagged value carrier used on the wire.

/// A decoded (or to-be-encoded) protocol frame.
///
/// `RawString` has no on-wire prefix of its own; the encoder writes its
/// payload verbatim. It exists only so the handshake snapshot can be emitted
/// as a single `$<len>CRLF<bytes>` frame with no trailing CRLF (see
/// `protocol::encoder::write_raw`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SimpleString(String),
    SimpleError { kind: String, message: String },
    Integer(i64),
    BulkString(Vec<u8>),
    NullBulkString,
    Null,
    Array(Vec<Value>),
    RawString(Vec<u8>),
}

impl Value {
    pub fn ok() -> Self {
        Value::SimpleString("OK".to_string())
    }

    pub fn simple(s: impl Into<String>) -> Self {
        Value::SimpleString(s.into())
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Value::SimpleError {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Value::BulkString(bytes.into())
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(values)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::NullBulkString)
    }

    /// Reinterpret an `Array` of `BulkString`s as a command descriptor:
    /// `{command: uppercase(first), args: remaining}`. Returns `None` if the
    /// frame is not an array of bulk strings.
    pub fn as_command(&self) -> Option<(String, Vec<Vec<u8>>)> {
        let items = match self {
            Value::Array(items) => items,
            _ => return None,
        };
        if items.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::BulkString(bytes) => parts.push(bytes.clone()),
                _ => return None,
            }
        }
        let command = String::from_utf8_lossy(&parts[0]).to_uppercase();
        Some((command, parts[1..].to_vec()))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::BulkString(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::BulkString(s.into_bytes())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Value::ok(), Value::SimpleString("OK".into()));
        assert!(Value::NullBulkString.is_null());
        assert!(!Value::bulk("hi").is_null());
    }

    #[test]
    fn test_as_command() {
        let frame = Value::Array(vec![
            Value::bulk("set"),
            Value::bulk("k"),
            Value::bulk("v"),
        ]);
        let (cmd, args) = frame.as_command().unwrap();
        assert_eq!(cmd, "SET");
        assert_eq!(args, vec![b"k".to_vec(), b"v".to_vec()]);
    }

    #[test]
    fn test_as_command_rejects_non_array() {
        assert!(Value::Integer(1).as_command().is_none());
    }
}
