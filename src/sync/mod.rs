//! Sync strategies.
//!
//! Every strategy reads from a [`RecordStore`](record_store::RecordStore),
//! delivers through an [`EventSink`](record_sink::EventSink), receives the
//! current watermark by value and returns the next one inside its
//! [`SyncOutcome`].
//!
//! - [`sync_all_no_limit`] - one query, everything in memory
//! - [`sync_all_safely`] - paginated, bounded memory, resumable
//! - [`sync_new_changes`] - only records past the watermark
//!
//! Per-record failures never abort a strategy; they are counted in the
//! outcome and hold the watermark back so the next delta pass retries them.
//! A failed source read aborts the invocation with
//! [`SyncError::StoreUnavailable`](crate::SyncError::StoreUnavailable).

mod batched;
mod delta;
mod full;
mod outcome;

pub use batched::{sync_all_safely, BatchCursor};
pub use delta::sync_new_changes;
pub use full::sync_all_no_limit;
pub use outcome::{Strategy, SyncOutcome};
