/// All errors that can be returned by a LedgerStorage implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: a key read inside the
    /// snapshot was changed by another commit before this one landed.
    #[error("concurrent conflict on key {key}: read version {expected_version}, found {found_version}")]
    ConcurrentConflict {
        key: String,
        expected_version: u64,
        found_version: u64,
    },

    /// `insert` on a key that already holds a value.
    #[error("key already exists: {key}")]
    AlreadyExists { key: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
