//! record-sync library
//!
//! Replicates records from a source record store into a target store and keeps
//! the target eventually consistent without re-copying everything each cycle.
//!
//! # Features
//!
//! - Full synchronization: every matching record in one pass
//! - Batched synchronization: the same result in bounded-size pages, resumable
//! - Delta synchronization: only records changed since a watermark
//! - Polling: a bootstrap sync followed by delta passes on a fixed cadence
//!
//! # Workspace Crates
//!
//! - `sync_core` - records, field names, identities, predicates
//! - `checkpoint` - watermarks and the tracker that advances them
//! - `record_store` - the store trait plus in-memory and JSONL stores
//! - `record_sink` - the event sink trait and the store-backed sink
//!
//! # CLI Usage
//!
//! ```bash
//! # One batched full sync between two JSONL files
//! record-sync full --source source.jsonl --target target.jsonl --page-size 100
//!
//! # One delta pass from a watermark printed by an earlier run
//! record-sync incremental --source source.jsonl --target target.jsonl \
//!   --from "2024-06-15T14:30:00.123Z,GE"
//!
//! # Bootstrap, then poll every 500ms for ten minutes
//! record-sync sync --source source.jsonl --target target.jsonl \
//!   --poll-interval 500ms --timeout 10m
//! ```

pub mod config;
mod error;
pub mod scheduler;
pub mod sync;

pub use config::SyncConfig;
pub use error::SyncError;
pub use scheduler::{synchronize, SchedulerState, SessionSummary, SyncHandle, Synchronizer};
pub use sync::{
    sync_all_no_limit, sync_all_safely, sync_new_changes, BatchCursor, Strategy, SyncOutcome,
};

pub use checkpoint::{Checkpoint, Watermark};
pub use record_sink::{Delivery, EventSink, SinkError, StoreSink};
pub use record_store::{JsonlStore, MemoryStore, RecordStore, RecordStream, StoreError};
pub use sync_core::{FieldNames, Predicate, Record, RecordIdentity};
