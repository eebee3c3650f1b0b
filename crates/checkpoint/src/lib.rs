//! Watermark tracking for record-sync
//!
//! A watermark records how far a sync session has progressed through the
//! source's change history: every record whose identity is at or below the
//! watermark is known to be applied to the target.
//!
//! # Architecture
//!
//! This crate provides:
//! - The `Checkpoint` trait for positions that can be handed over on the
//!   command line
//! - [`Watermark`], the `(position, last_key)` pair the strategies pass around
//!   by value
//! - [`WatermarkTracker`], which folds per-record results of one strategy
//!   invocation into the next watermark
//!
//! Watermarks live in memory for the lifetime of a sync session. Persisting
//! them across restarts is left to the caller, which can render one with
//! `to_cli_string()` and feed it back with `--from`.

mod tracker;
mod watermark;


pub use tracker::WatermarkTracker;
pub use watermark::Watermark;

/// Trait for sync positions that round-trip through a CLI string.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct SequenceCheckpoint {
///     pub sequence_id: i64,
/// }
///
/// impl Checkpoint for SequenceCheckpoint {
///     const KIND: &'static str = "sequence";
///
///     fn to_cli_string(&self) -> String {
///         self.sequence_id.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self {
///             sequence_id: s.parse()?,
///         })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Checkpoint kind identifier, used in logs and error messages.
    const KIND: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
