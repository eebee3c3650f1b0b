//! Core types for the record-sync framework.
//!
//! This crate provides the foundational types shared by the stores, the sink
//! and the synchronization strategies:
//!
//! - [`Record`] - Opaque field map replicated from source to target
//! - [`FieldNames`] - Which fields hold the natural key and the change marker
//! - [`RecordIdentity`] - Validated `(updated_at, key)` pair, totally ordered
//! - [`Predicate`] - Field filter evaluated by record stores
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── checkpoint     (watermarks over RecordIdentity)
//!    ├─── record-store   (evaluates Predicate, stores Record)
//!    ├─── record-sink    (delivers Record to a target store)
//!    └─── record-sync    (strategies + scheduler)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{FieldNames, Record};
//!
//! let record = Record::from_value(serde_json::json!({
//!     "name": "GE",
//!     "owner": "test",
//!     "updatedAt": "2024-01-01T00:00:00Z",
//! }))
//! .unwrap();
//!
//! let identity = record.identity(&FieldNames::default()).unwrap();
//! assert_eq!(identity.key, "GE");
//! ```

pub mod predicate;
pub mod record;

pub use predicate::Predicate;
pub use record::{FieldNames, Record, RecordIdentity};

/// Error type for record validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// A mandatory field is absent
    #[error("Record is missing mandatory field '{field}'")]
    MissingField { field: String },

    /// The natural key is present but not a string or integer
    #[error("Field '{field}' is not a usable natural key: {value}")]
    InvalidKey { field: String, value: String },

    /// The change marker is present but neither RFC 3339 nor epoch millis
    #[error("Field '{field}' is not a valid change marker: {value}")]
    InvalidChangeMarker { field: String, value: String },

    /// The JSON document is not an object
    #[error("Record must be a JSON object, got: {0}")]
    NotAnObject(String),
}
