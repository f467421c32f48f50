use chrono::{DateTime, Utc};

/// A single header attached to a message. Order is preserved as delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// One record consumed from partition 0 of a topic.
///
/// Produced by the message source, consumed once by the decode/emit
/// pipeline, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Position within the partition. Unique, monotonically increasing.
    pub offset: i64,
    /// Broker timestamp. Sources map a missing timestamp to the Unix epoch.
    pub timestamp: DateTime<Utc>,
    /// Opaque key bytes, possibly empty.
    pub key: Vec<u8>,
    /// `None` when the broker delivered no header block at all.
    pub headers: Option<Vec<Header>>,
    /// `None` for a tombstone / null value. Distinct from an empty value.
    pub value: Option<Vec<u8>>,
}

impl Message {
    pub fn new(offset: i64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            key: Vec::new(),
            headers: None,
            value: Some(value.into()),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.get_or_insert_with(Vec::new).push(Header::new(key, value));
        self
    }

    /// Tombstone: a message whose value is absent.
    pub fn tombstone(offset: i64) -> Self {
        Self {
            value: None,
            ..Self::new(offset, Vec::new())
        }
    }
}
