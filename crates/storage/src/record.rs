use serde::{Deserialize, Serialize};

/// A committed key/value pair as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub key: String,
    /// Starts at 1 on first write and increases by one on every committed write.
    pub version: u64,
    pub value: serde_json::Value,
}

/// One entry of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Global position in commit order, starting at 0.
    pub sequence: u64,
    /// RFC 3339 timestamp string (UTC) taken at commit.
    pub recorded_at: String,
    pub payload: serde_json::Value,
}

/// What a successful commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Commit sequence number of this snapshot.
    pub commit: u64,
    pub keys_written: usize,
    /// Sequence numbers assigned to the events appended by this snapshot.
    pub event_sequences: Vec<u64>,
}
