//! Storage errors.

use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("not found")]
    NotFound,

    /// A unique index rejected the write. Callers may rescan and retry.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// `RocksDB` reported an error.
    #[error("rocksdb: {0}")]
    Database(String),

    /// A value failed to encode or decode as CBOR.
    #[error("codec: {0}")]
    Serialization(String),

    /// A key in an index column family has the wrong layout.
    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

impl StoreError {
    /// Whether a unique index rejected the write.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<campus_core::IdError> for StoreError {
    fn from(err: campus_core::IdError) -> Self {
        Self::CorruptKey(err.to_string())
    }
}
