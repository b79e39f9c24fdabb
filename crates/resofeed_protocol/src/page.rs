//! Page results and the replication batch handed to consumers.

use crate::checkpoint::{Checkpoint, RecordKey};
use crate::query::OrderingKey;
use serde::{Deserialize, Serialize};

/// A feed record: an open mapping of field name to JSON value.
///
/// At minimum a replicated record carries the two ordering-key fields.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The JSON envelope returned for one page request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope {
    /// The records for this page. An empty array is the terminal signal.
    #[serde(rename = "value")]
    pub records: Vec<Record>,
    /// Total collection count, present when `$count=true` was requested.
    #[serde(rename = "@odata.count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Server-provided continuation link, if any. Unused by the driver,
    /// which derives its own continuation from the checkpoint.
    #[serde(rename = "@odata.nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl PageEnvelope {
    /// Wraps a record list in a bare envelope.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            count: None,
            next_link: None,
        }
    }

    /// Returns true if this page carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records in this page.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Extracts a record's `(timestamp, key)` ordering pair.
///
/// Returns `None` when either field is absent or has an unusable type; the
/// driver turns that into an error because it cannot compute the next
/// boundary without the pair.
pub fn ordering_pair(record: &Record, ordering: &OrderingKey) -> Option<(String, RecordKey)> {
    let timestamp = record.get(&ordering.timestamp_field)?.as_str()?.to_string();
    let key = match record.get(&ordering.key_field)? {
        serde_json::Value::String(s) => RecordKey::Text(s.clone()),
        serde_json::Value::Number(n) => RecordKey::Number(n.as_i64()?),
        _ => return None,
    };
    Some((timestamp, key))
}

/// One page of records paired with the checkpoint as advanced past it.
///
/// Consumers may persist the pair atomically to make a sync resumable at
/// page granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationBatch {
    /// The page's records, ascending in `(timestamp, key)`.
    pub records: Vec<Record>,
    /// The checkpoint after advancing past this page's last record.
    pub checkpoint: Checkpoint,
}
