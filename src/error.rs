//! Error taxonomy for sync strategies and the poll scheduler.

use record_sink::SinkError;
use record_store::StoreError;
use sync_core::RecordError;

/// Errors surfaced by a strategy invocation or a sync session.
///
/// Per-record failures (`ApplyFailed`, `MalformedRecord`) are counted in the
/// [`SyncOutcome`](crate::SyncOutcome) and logged; strategies only return an
/// `Err` for failures that abort the whole invocation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A store could not serve a read. Transient; retried on the next tick.
    #[error("{store} store unavailable: {message}")]
    StoreUnavailable {
        store: &'static str,
        message: String,
    },

    /// The sink failed to apply a single record.
    #[error("Failed to apply record '{key}': {message}")]
    ApplyFailed { key: String, message: String },

    /// Missing or invalid natural key or change marker.
    #[error("Malformed record: {0}")]
    MalformedRecord(#[from] RecordError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The scheduler task is gone (panicked or already stopped).
    #[error("Synchronizer is no longer running")]
    Shutdown,
}

impl SyncError {
    /// Read-path failure on the source store.
    pub fn source_unavailable(err: StoreError) -> Self {
        Self::StoreUnavailable {
            store: "source",
            message: err.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Check if the failed operation may succeed when attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable { .. } => true,
            Self::ApplyFailed { .. } => true,
            Self::MalformedRecord(_) => false,
            Self::InvalidConfig(_) => false,
            Self::Shutdown => false,
        }
    }
}

impl From<SinkError> for SyncError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Malformed(e) => Self::MalformedRecord(e),
            SinkError::Write { key, source } => Self::ApplyFailed {
                key,
                message: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SyncError::source_unavailable(StoreError::unavailable("down")).is_retryable());
        assert!(SyncError::ApplyFailed {
            key: "GE".into(),
            message: "quota".into()
        }
        .is_retryable());
        assert!(!SyncError::invalid_config("page_size must be positive").is_retryable());
        assert!(!SyncError::Shutdown.is_retryable());
    }

    #[test]
    fn test_sink_write_error_becomes_apply_failed() {
        let err: SyncError = SinkError::Write {
            key: "GE".to_string(),
            source: StoreError::unavailable("connection reset"),
        }
        .into();

        match err {
            SyncError::ApplyFailed { key, message } => {
                assert_eq!(key, "GE");
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_source_unavailable_names_store() {
        let err = SyncError::source_unavailable(StoreError::unavailable("timeout"));
        let msg = err.to_string();
        assert!(msg.starts_with("source store unavailable"));
        assert!(msg.contains("timeout"));
    }
}
