//! The resumable replication cursor.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The timestamp a fresh checkpoint starts from.
pub const EPOCH_START: &str = "1970-01-01T00:00:00Z";

/// The tie-breaking half of the compound ordering key.
///
/// Feeds identify records with either string keys (`ListingKey`, `MediaKey`)
/// or integer keys. Both forms must order totally so that checkpoints remain
/// comparable: an integer always orders before any text, which makes the
/// default `Number(0)` a minimal sentinel for string-keyed resources too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    /// Integer record key.
    Number(i64),
    /// String record key.
    Text(String),
}

impl RecordKey {
    /// Renders the key as an OData filter literal.
    ///
    /// Text keys are single-quoted with embedded quotes doubled; integer
    /// keys render bare.
    pub fn literal(&self) -> String {
        match self {
            RecordKey::Number(n) => n.to_string(),
            RecordKey::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecordKey::Number(a), RecordKey::Number(b)) => a.cmp(b),
            (RecordKey::Text(a), RecordKey::Text(b)) => a.cmp(b),
            (RecordKey::Number(_), RecordKey::Text(_)) => Ordering::Less,
            (RecordKey::Text(_), RecordKey::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Number(n) => write!(f, "{n}"),
            RecordKey::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(n: i64) -> Self {
        RecordKey::Number(n)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::Text(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey::Text(s)
    }
}

/// The replication position: the `(timestamp, key)` pair of the last record
/// already emitted.
///
/// Both fields together are the persisted-state contract: a caller storing a
/// checkpoint across restarts must preserve them verbatim, which the serde
/// representation guarantees (`{"last_timestamp": ..., "last_key": ...}`).
///
/// The checkpoint is advanced by the replication driver exactly once per
/// non-empty page, from that page's last record. It is never persisted by the
/// driver; persisting after each page is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Modification timestamp of the last emitted record. Treated as an
    /// opaque string whose lexical order matches its temporal order.
    pub last_timestamp: String,
    /// Record key of the last emitted record.
    pub last_key: RecordKey,
}

impl Checkpoint {
    /// Creates a fresh checkpoint at the epoch sentinel.
    pub fn new() -> Self {
        Self {
            last_timestamp: EPOCH_START.to_string(),
            last_key: RecordKey::Number(0),
        }
    }

    /// Creates a checkpoint resuming from a previously persisted position.
    pub fn resume(last_timestamp: impl Into<String>, last_key: impl Into<RecordKey>) -> Self {
        Self {
            last_timestamp: last_timestamp.into(),
            last_key: last_key.into(),
        }
    }

    /// Moves the checkpoint past a record's `(timestamp, key)` pair.
    pub fn advance(&mut self, timestamp: impl Into<String>, key: impl Into<RecordKey>) {
        self.last_timestamp = timestamp.into();
        self.last_key = key.into();
    }

    /// Returns true if `(timestamp, key)` lies strictly after this
    /// checkpoint, i.e. the record would pass the boundary filter built
    /// from it.
    pub fn admits(&self, timestamp: &str, key: &RecordKey) -> bool {
        timestamp > self.last_timestamp.as_str()
            || (timestamp == self.last_timestamp && *key > self.last_key)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}
