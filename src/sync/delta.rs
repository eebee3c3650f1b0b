//! Change-only sync from a watermark.

use checkpoint::{Watermark, WatermarkTracker};
use futures::TryStreamExt;
use record_sink::EventSink;
use record_store::RecordStore;
use sync_core::{Predicate, Record, RecordIdentity};

use super::outcome::{RecordApplier, Strategy, SyncOutcome};
use crate::SyncError;

/// Apply every source record not covered by `watermark`.
///
/// Changed records are matched by natural key on the target, applied in
/// ascending `(updated_at, key)` order, and the watermark moves to the last
/// record applied before the first failure. Records past a failure are still
/// delivered; they sort above the returned watermark and are seen again on
/// the next pass.
///
/// `filter` narrows the change query the same way the bootstrap sync is
/// narrowed; pass [`Predicate::All`] for no filtering.
pub async fn sync_new_changes<S, K>(
    source: &S,
    sink: &K,
    filter: &Predicate,
    watermark: Watermark,
) -> Result<SyncOutcome, SyncError>
where
    S: RecordStore + ?Sized,
    K: EventSink + ?Sized,
{
    let names = source.field_names();
    let predicate = filter.clone().and(watermark.changed_since(names));

    tracing::debug!("Querying changes since {watermark}");

    let records: Vec<Record> = source
        .find(&predicate)
        .await
        .map_err(SyncError::source_unavailable)?
        .try_collect()
        .await
        .map_err(SyncError::source_unavailable)?;

    let mut applier = RecordApplier::new(sink, names, WatermarkTracker::ordered(watermark));

    let mut changes: Vec<(RecordIdentity, Record)> = Vec::with_capacity(records.len());
    for record in records {
        match record.identity(names) {
            Ok(identity) => changes.push((identity, record)),
            Err(e) => applier.skip(&record, &e),
        }
    }
    changes.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, record) in &changes {
        applier.apply(record).await;
    }

    let outcome = applier.finish(Strategy::Delta, 1, false);
    if outcome.records_examined > 0 {
        tracing::info!(
            "Delta sync: {} changed, {} applied, {} unchanged, {} failed, {} skipped; watermark {}",
            outcome.records_examined,
            outcome.records_applied,
            outcome.records_unchanged,
            outcome.records_failed,
            outcome.records_skipped,
            outcome.new_watermark
        );
    } else {
        tracing::debug!("Delta sync: no changes since {}", outcome.new_watermark);
    }
    Ok(outcome)
}
