//! Thread-safe in-memory key/value store with lazy TTL expiry.

pub mod stream;

pub use stream::{StreamEntry, StreamLog};

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// The value a stored record carries.
#[derive(Debug, Clone)]
pub enum RecordValue {
    Str(Vec<u8>),
    Stream(StreamLog),
}

#[derive(Debug, Clone)]
struct Record {
    value: RecordValue,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// The result of a `GET`: present, absent (never existed or expired), or
/// present but holding a value `GET` can't return as a bulk string.
pub enum Lookup {
    Value(Vec<u8>),
    Absent,
    WrongType,
}

/// `-1` as an `expiry_ms` argument to `set` means "no TTL".
pub const NO_EXPIRY: i64 = -1;

pub struct Store {
    data: RwLock<HashMap<String, Record>>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the value for `key`, `Lookup::Absent` if missing or expired,
    /// or `Lookup::WrongType` if `key` holds a `Stream`. An expired key is
    /// deleted lazily: we first check under a shared lock, then re-acquire
    /// exclusively to delete. A racing reader observing the key between the
    /// two acquisitions may also trigger the delete — harmless, since
    /// deleting an already-deleted key is a no-op.
    pub fn get(&self, key: &str) -> Lookup {
        let expired = {
            let data = self.data.read().unwrap();
            match data.get(key) {
                None => return Lookup::Absent,
                Some(record) if record.is_expired() => true,
                Some(Record { value: RecordValue::Str(bytes), .. }) => {
                    return Lookup::Value(bytes.clone())
                }
                Some(Record { value: RecordValue::Stream(_), .. }) => return Lookup::WrongType,
            }
        };
        if expired {
            let mut data = self.data.write().unwrap();
            if data.get(key).map(|r| r.is_expired()).unwrap_or(false) {
                data.remove(key);
            }
        }
        Lookup::Absent
    }

    /// `expiry_ms == NO_EXPIRY` means no TTL; otherwise the record expires
    /// `expiry_ms` milliseconds from now. A `SET` always clears any prior TTL
    /// on the key it overwrites (there is no independent "clear TTL only"
    /// affordance in this dispatcher's command set).
    pub fn set(&self, key: String, value: Vec<u8>, expiry_ms: i64) {
        let expires_at = if expiry_ms == NO_EXPIRY {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(expiry_ms.max(0) as u64))
        };
        let mut data = self.data.write().unwrap();
        data.insert(
            key,
            Record {
                value: RecordValue::Str(value),
                expires_at,
            },
        );
    }

    /// `"string"` / `"stream"` / `"none"`. Lazily expires the key first so a
    /// just-expired key reports `"none"`.
    pub fn type_of(&self, key: &str) -> &'static str {
        let expired = {
            let data = self.data.read().unwrap();
            match data.get(key) {
                None => return "none",
                Some(record) if record.is_expired() => true,
                Some(Record { value, .. }) => {
                    return match value {
                        RecordValue::Str(_) => "string",
                        RecordValue::Stream(_) => "stream",
                    }
                }
            }
        };
        if expired {
            let mut data = self.data.write().unwrap();
            if data.get(key).map(|r| r.is_expired()).unwrap_or(false) {
                data.remove(key);
            }
        }
        "none"
    }

    /// Appends `entry` to the stream at `key`, creating it if absent.
    /// Returns an error if `key` holds a non-stream value (the dispatcher
    /// turns this into a `WRONGTYPE` reply).
    pub fn append_stream(&self, key: &str, entry: StreamEntry) -> Result<(), ()> {
        let mut data = self.data.write().unwrap();
        match data.get_mut(key) {
            Some(record) if record.is_expired() => {
                let mut log = StreamLog::new();
                log.append(entry);
                *record = Record {
                    value: RecordValue::Stream(log),
                    expires_at: None,
                };
                Ok(())
            }
            Some(Record { value: RecordValue::Stream(log), .. }) => {
                log.append(entry);
                Ok(())
            }
            Some(_) => Err(()),
            None => {
                let mut log = StreamLog::new();
                log.append(entry);
                data.insert(
                    key.to_string(),
                    Record {
                        value: RecordValue::Stream(log),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
