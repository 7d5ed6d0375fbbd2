//! In-memory `LedgerStorage` backend.
//!
//! Committed state lives behind one mutex; snapshots buffer their reads,
//! writes and events privately and validate the recorded read versions at
//! commit (optimistic concurrency control). The mutex is never held across
//! an await point.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{CommitReceipt, EventRecord, ValueRecord};
use crate::traits::LedgerStorage;

/// Version reported for a key that has never been written.
const ABSENT: u64 = 0;

/// Process-local storage backend. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, Versioned>,
    events: Vec<EventRecord>,
    commits: u64,
}

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    value: Value,
}

/// Transaction state of a [`MemoryStorage`] snapshot.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    /// key -> version observed on first read (`ABSENT` when missing).
    reads: BTreeMap<String, u64>,
    writes: BTreeMap<String, Value>,
    events: Vec<Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }

    /// Every committed key with its value, in key order.
    pub fn dump(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect())
    }

    /// Number of snapshots committed so far.
    pub fn commit_count(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.commits)
    }

    fn committed_version(&self, key: &str) -> Result<(u64, Option<Value>), StorageError> {
        let inner = self.lock()?;
        Ok(match inner.entries.get(key) {
            Some(v) => (v.version, Some(v.value.clone())),
            None => (ABSENT, None),
        })
    }
}

fn now_rfc3339() -> Result<String, StorageError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| StorageError::Backend(format!("timestamp formatting failed: {e}")))
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<CommitReceipt, StorageError> {
        let recorded_at = now_rfc3339()?;
        let mut inner = self.lock()?;

        for (key, expected) in &snapshot.reads {
            let found = inner.entries.get(key).map_or(ABSENT, |v| v.version);
            if found != *expected {
                tracing::debug!(%key, expected, found, "memory storage commit conflict");
                return Err(StorageError::ConcurrentConflict {
                    key: key.clone(),
                    expected_version: *expected,
                    found_version: found,
                });
            }
        }

        let keys_written = snapshot.writes.len();
        for (key, value) in snapshot.writes {
            let version = inner.entries.get(&key).map_or(ABSENT, |v| v.version) + 1;
            inner.entries.insert(key, Versioned { version, value });
        }

        let mut event_sequences = Vec::with_capacity(snapshot.events.len());
        for payload in snapshot.events {
            let sequence = inner.events.len() as u64;
            inner.events.push(EventRecord {
                sequence,
                recorded_at: recorded_at.clone(),
                payload,
            });
            event_sequences.push(sequence);
        }

        let commit = inner.commits;
        inner.commits += 1;
        tracing::trace!(commit, keys_written, events = event_sequences.len(), "memory storage commit");

        Ok(CommitReceipt {
            commit,
            keys_written,
            event_sequences,
        })
    }

    async fn abort_snapshot(&self, _snapshot: MemorySnapshot) -> Result<(), StorageError> {
        Ok(())
    }

    async fn read(
        &self,
        snapshot: &mut MemorySnapshot,
        key: &str,
    ) -> Result<Option<Value>, StorageError> {
        if let Some(buffered) = snapshot.writes.get(key) {
            return Ok(Some(buffered.clone()));
        }
        let (version, value) = self.committed_version(key)?;
        snapshot.reads.entry(key.to_string()).or_insert(version);
        Ok(value)
    }

    async fn write(
        &self,
        snapshot: &mut MemorySnapshot,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        snapshot.writes.insert(key.to_string(), value);
        Ok(())
    }

    async fn insert(
        &self,
        snapshot: &mut MemorySnapshot,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        if snapshot.writes.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        let (version, existing) = self.committed_version(key)?;
        if existing.is_some() {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        snapshot.reads.entry(key.to_string()).or_insert(version);
        snapshot.writes.insert(key.to_string(), value);
        Ok(())
    }

    async fn append_event(
        &self,
        snapshot: &mut MemorySnapshot,
        payload: Value,
    ) -> Result<(), StorageError> {
        snapshot.events.push(payload);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ValueRecord>, StorageError> {
        let inner = self.lock()?;
        Ok(inner.entries.get(key).map(|v| ValueRecord {
            key: key.to_string(),
            version: v.version,
            value: v.value.clone(),
        }))
    }

    async fn list_events(
        &self,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let inner = self.lock()?;
        let start = after.map_or(0, |seq| seq.saturating_add(1) as usize);
        let iter = inner.events.iter().skip(start).cloned();
        Ok(if limit == 0 {
            iter.collect()
        } else {
            iter.take(limit).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn clones_share_state() {
        let a = MemoryStorage::new();
        let b = a.clone();
        let mut snap = a.begin_snapshot().await.unwrap();
        a.write(&mut snap, "k", json!(1)).await.unwrap();
        a.commit_snapshot(snap).await.unwrap();
        assert_eq!(b.get("k").await.unwrap().unwrap().value, json!(1));
    }

    #[tokio::test]
    async fn dump_is_key_ordered() {
        let s = MemoryStorage::new();
        let mut snap = s.begin_snapshot().await.unwrap();
        s.write(&mut snap, "b", json!("two")).await.unwrap();
        s.write(&mut snap, "a", json!("one")).await.unwrap();
        s.commit_snapshot(snap).await.unwrap();
        let keys: Vec<String> = s.dump().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn commit_count_ignores_aborts() {
        let s = MemoryStorage::new();
        let snap = s.begin_snapshot().await.unwrap();
        s.commit_snapshot(snap).await.unwrap();
        let snap = s.begin_snapshot().await.unwrap();
        s.abort_snapshot(snap).await.unwrap();
        assert_eq!(s.commit_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn receipt_reports_event_sequences() {
        let s = MemoryStorage::new();
        let mut snap = s.begin_snapshot().await.unwrap();
        s.append_event(&mut snap, json!({"n": 0})).await.unwrap();
        s.append_event(&mut snap, json!({"n": 1})).await.unwrap();
        let receipt = s.commit_snapshot(snap).await.unwrap();
        assert_eq!(receipt.event_sequences, vec![0, 1]);
        assert_eq!(receipt.keys_written, 0);
    }
}
