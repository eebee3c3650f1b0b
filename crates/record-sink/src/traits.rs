//! EventSink trait definition.

use record_store::StoreError;
use sync_core::RecordError;

/// Result of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The target was written.
    Applied,
    /// The target already held an identical record; nothing was written.
    Unchanged,
}

/// Error type for a single failed delivery.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The record cannot be identified (missing or invalid key or marker).
    #[error("Malformed record: {0}")]
    Malformed(#[from] RecordError),

    /// The target refused or failed the write.
    #[error("Failed to write record '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl SinkError {
    /// Natural key of the record, if it could be extracted.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Malformed(_) => None,
            Self::Write { key, .. } => Some(key),
        }
    }
}

/// Trait for delivering records downstream.
///
/// Strategies are generic over this trait:
///
/// ```ignore
/// pub async fn sync_all_no_limit<S: RecordStore, K: EventSink>(
///     source: &S,
///     sink: &K,
///     predicate: &Predicate,
///     start: Watermark,
/// ) -> Result<SyncOutcome, SyncError> {
///     // every matching record goes through sink.deliver()
/// }
/// ```
///
/// `deliver` must be idempotent per natural key: delivering the same record
/// twice leaves the target as if it had been delivered once.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one record, reporting whether the target changed.
    async fn deliver(&self, record: &sync_core::Record) -> Result<Delivery, SinkError>;

    /// Number of records applied over this sink's lifetime.
    fn delivered(&self) -> u64;
}
