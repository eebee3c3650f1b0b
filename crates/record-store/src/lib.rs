//! Record store abstraction.
//!
//! This crate defines the `RecordStore` trait that every source and target
//! store implements, so the sync strategies can be written once against a
//! uniform query/insert/update surface.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`] - insertion-ordered in-memory store with optional
//!   automatic `createdAt`/`updatedAt` stamping
//! - [`JsonlStore`] - JSON Lines file, re-read on every query

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use futures::stream::BoxStream;
use sync_core::{FieldNames, Predicate, Record, RecordError};

/// Lazy, finite, non-restartable stream of query results.
///
/// Polling it to completion yields each matching record once, in the store's
/// insertion order. Issuing the query again is the only way to restart.
pub type RecordStream<'a> = BoxStream<'a, Result<Record, StoreError>>;

/// Error type for record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot serve requests right now.
    ///
    /// Transient; the same operation may succeed later.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// The store refused a single write.
    #[error("Write rejected for record '{key}': {message}")]
    Rejected { key: String, message: String },

    /// Plain insert of a key that is already present
    #[error("Record with key '{key}' already exists")]
    DuplicateKey { key: String },

    /// Record lacks a usable natural key or change marker
    #[error("Malformed record: {0}")]
    Malformed(#[from] RecordError),

    /// Stored document could not be parsed
    #[error("Invalid record at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Check if retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Io(_) => true,
            Self::Rejected { .. } => false,
            Self::DuplicateKey { .. } => false,
            Self::Malformed(_) => false,
            Self::Parse { .. } => false,
        }
    }
}

/// Uniform query/upsert surface over a source or target store.
///
/// Implementations guarantee natural-key uniqueness: at most one record per
/// key, as named by [`RecordStore::field_names`].
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Names of the natural key and change marker fields.
    fn field_names(&self) -> &FieldNames;

    /// Query records matching `predicate`, in insertion order.
    async fn find(&self, predicate: &Predicate) -> Result<RecordStream<'_>, StoreError>;

    /// Look up a single record by natural key.
    async fn find_one(&self, key: &str) -> Result<Option<Record>, StoreError>;

    /// Insert the record, or overwrite the record with the same natural key.
    async fn insert_or_update(&self, record: Record) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::unavailable("connection reset").is_transient());
        assert!(StoreError::Io(std::io::Error::other("disk gone")).is_transient());
        assert!(!StoreError::DuplicateKey {
            key: "GE".to_string()
        }
        .is_transient());
        assert!(!StoreError::Rejected {
            key: "GE".to_string(),
            message: "quota".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_formatting() {
        let err = StoreError::Parse {
            line: 3,
            message: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("expected value"));
    }
}
