//! Per-invocation results and the per-record apply step shared by all
//! strategies.

use checkpoint::{Watermark, WatermarkTracker};
use record_sink::{Delivery, EventSink, SinkError};
use serde::Serialize;
use sync_core::{FieldNames, Record};

use crate::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Full,
    Batched,
    Delta,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Full => write!(f, "full"),
            Strategy::Batched => write!(f, "batched"),
            Strategy::Delta => write!(f, "delta"),
        }
    }
}

/// Result of one strategy invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub strategy: Strategy,
    /// Records drawn from the source
    pub records_examined: u64,
    /// Records written to the target
    pub records_applied: u64,
    /// Records the target already held with identical content
    pub records_unchanged: u64,
    /// Records the sink failed to write
    pub records_failed: u64,
    /// Records without a usable key or change marker
    pub records_skipped: u64,
    /// Batches drawn, including a final empty one
    pub batches: u64,
    #[serde(serialize_with = "serialize_watermark")]
    pub new_watermark: Watermark,
}

fn serialize_watermark<S: serde::Serializer>(w: &Watermark, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(w)
}

impl SyncOutcome {
    /// Records whose content is confirmed present in the target.
    pub fn records_confirmed(&self) -> u64 {
        self.records_applied + self.records_unchanged
    }

    pub fn has_failures(&self) -> bool {
        self.records_failed > 0
    }
}

/// Applies records through a sink, tallying results and feeding the
/// watermark tracker.
pub(crate) struct RecordApplier<'a, K: ?Sized> {
    sink: &'a K,
    names: &'a FieldNames,
    tracker: WatermarkTracker,
    pub(crate) examined: u64,
    pub(crate) applied: u64,
    pub(crate) unchanged: u64,
    pub(crate) failed: u64,
    pub(crate) skipped: u64,
}

impl<'a, K: EventSink + ?Sized> RecordApplier<'a, K> {
    pub(crate) fn new(sink: &'a K, names: &'a FieldNames, tracker: WatermarkTracker) -> Self {
        Self {
            sink,
            names,
            tracker,
            examined: 0,
            applied: 0,
            unchanged: 0,
            failed: 0,
            skipped: 0,
        }
    }

    /// Count a record that was drawn but rejected before delivery.
    pub(crate) fn skip(&mut self, record: &Record, err: &sync_core::RecordError) {
        self.examined += 1;
        self.skipped += 1;
        tracing::warn!(
            "Skipping record {}: {}",
            serde_json::Value::Object(record.fields().clone()),
            err
        );
    }

    /// Deliver one record. Never fails; per-record errors are tallied.
    pub(crate) async fn apply(&mut self, record: &Record) {
        let identity = match record.identity(self.names) {
            Ok(identity) => identity,
            Err(e) => return self.skip(record, &e),
        };
        self.examined += 1;

        match self.sink.deliver(record).await {
            Ok(Delivery::Applied) => {
                self.applied += 1;
                self.tracker.applied(&identity);
            }
            Ok(Delivery::Unchanged) => {
                self.unchanged += 1;
                self.tracker.applied(&identity);
            }
            Err(SinkError::Malformed(e)) => {
                // Target disagrees with the source about field names
                self.skipped += 1;
                tracing::warn!("Target rejected record {identity}: {e}");
            }
            Err(e) => {
                self.failed += 1;
                self.tracker.failed(&identity);
                let err = SyncError::from(e);
                tracing::warn!("{err}");
            }
        }
    }

    /// Snapshot of the tracker, for resumable strategies.
    pub(crate) fn tracker_snapshot(&self) -> WatermarkTracker {
        self.tracker.clone()
    }

    pub(crate) fn finish(self, strategy: Strategy, batches: u64, hold: bool) -> SyncOutcome {
        let new_watermark = if hold {
            self.tracker.start().clone()
        } else {
            self.tracker.finish()
        };
        SyncOutcome {
            strategy,
            records_examined: self.examined,
            records_applied: self.applied,
            records_unchanged: self.unchanged,
            records_failed: self.failed,
            records_skipped: self.skipped,
            batches,
            new_watermark,
        }
    }
}
