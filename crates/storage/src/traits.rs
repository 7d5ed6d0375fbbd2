use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{CommitReceipt, EventRecord, ValueRecord};

/// The storage trait for tracechain ledger backends.
///
/// A `LedgerStorage` implementation is a strongly-consistent key-value
/// store with atomic read-modify-write transactions plus an append-only
/// event log. Values are opaque JSON documents; the ledger owns their
/// shape.
///
/// ## Snapshot Semantics
///
/// All reads and writes that belong to one ledger operation go through a
/// `Self::Snapshot`, a type representing an in-progress transaction:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call `read` / `write` / `insert` / `append_event` with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// Buffered writes and events are invisible to everybody else until the
/// commit. If a `Snapshot` is dropped without committing, nothing it
/// buffered may ever become visible.
///
/// ## OCC Conflict Detection
///
/// Every `read` (and `insert`) records the version of the key it observed.
/// `commit_snapshot` re-validates those versions and fails with
/// `StorageError::ConcurrentConflict` if any of them moved, applying
/// nothing. Of two snapshots that read-modify-write the same key, at most
/// one can commit.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a ledger can be
/// shared across async tasks.
#[async_trait]
pub trait LedgerStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all buffered writes and events durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot)
        -> Result<CommitReceipt, StorageError>;

    /// Abort (roll back) a snapshot, discarding all buffered work.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Key operations (within snapshot) ─────────────────────────────────────

    /// Read a key. Buffered writes of the same snapshot win over committed
    /// state; otherwise the committed version is recorded for OCC.
    async fn read(
        &self,
        snapshot: &mut Self::Snapshot,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StorageError>;

    /// Buffer an upsert of `key`.
    async fn write(
        &self,
        snapshot: &mut Self::Snapshot,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Buffer the creation of `key`.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the key is already
    /// committed or buffered in this snapshot. The absence is recorded for
    /// OCC, so two snapshots inserting the same key cannot both commit.
    async fn insert(
        &self,
        snapshot: &mut Self::Snapshot,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Buffer an audit-log entry. Its sequence number is assigned at commit.
    async fn append_event(
        &self,
        snapshot: &mut Self::Snapshot,
        payload: serde_json::Value,
    ) -> Result<(), StorageError>;

    // ── Query operations (committed state, outside snapshot) ─────────────────

    /// Read a committed key without opening a snapshot.
    async fn get(&self, key: &str) -> Result<Option<ValueRecord>, StorageError>;

    /// List committed events in sequence order.
    ///
    /// - `after`: only events with a sequence strictly greater than this
    /// - `limit`: maximum number of results (0 = no limit)
    async fn list_events(
        &self,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StorageError>;
}
