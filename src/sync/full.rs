//! Single-pass, unbounded full sync.

use checkpoint::{Watermark, WatermarkTracker};
use futures::TryStreamExt;
use record_sink::EventSink;
use record_store::RecordStore;
use sync_core::{Predicate, Record};

use super::outcome::{RecordApplier, Strategy, SyncOutcome};
use crate::SyncError;

/// Copy every record matching `predicate` from `source` into `sink`.
///
/// The whole result set is drawn into memory with one query before anything
/// is delivered. Use [`sync_all_safely`](super::sync_all_safely) when the
/// source may be large.
pub async fn sync_all_no_limit<S, K>(
    source: &S,
    sink: &K,
    predicate: &Predicate,
    start: Watermark,
) -> Result<SyncOutcome, SyncError>
where
    S: RecordStore + ?Sized,
    K: EventSink + ?Sized,
{
    tracing::info!("Starting full sync (predicate: {predicate})");

    let records: Vec<Record> = source
        .find(predicate)
        .await
        .map_err(SyncError::source_unavailable)?
        .try_collect()
        .await
        .map_err(SyncError::source_unavailable)?;

    tracing::debug!("Full sync drew {} records", records.len());

    let names = source.field_names();
    let mut applier = RecordApplier::new(sink, names, WatermarkTracker::unordered(start));
    for record in &records {
        applier.apply(record).await;
    }

    let outcome = applier.finish(Strategy::Full, 1, false);
    tracing::info!(
        "Full sync completed: {} examined, {} applied, {} unchanged, {} failed, {} skipped",
        outcome.records_examined,
        outcome.records_applied,
        outcome.records_unchanged,
        outcome.records_failed,
        outcome.records_skipped
    );
    Ok(outcome)
}
