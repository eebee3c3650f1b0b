//! Event sink abstraction.
//!
//! This crate defines the `EventSink` trait that every sync strategy uses to
//! deliver a record to the target, and `StoreSink`, the implementation that
//! upserts into a [`record_store::RecordStore`].
//!
//! Sinks report per-record success or failure; strategies decide what a
//! failure means for the watermark.

mod store_sink;
mod traits;

pub use store_sink::StoreSink;
pub use traits::{Delivery, EventSink, SinkError};
