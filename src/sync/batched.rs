//! Paginated full sync.

use std::collections::HashSet;

use checkpoint::{Watermark, WatermarkTracker};
use futures::StreamExt;
use record_sink::EventSink;
use record_store::RecordStore;
use sync_core::{Predicate, Record, RecordIdentity};
use tokio::sync::watch;

use super::outcome::{RecordApplier, Strategy, SyncOutcome};
use crate::SyncError;

/// Position of a batched sync within its result set.
///
/// Returned by [`sync_all_safely`]. An interrupted run hands back a cursor
/// with `exhausted == false`; passing it to the next call resumes after the
/// last fully applied batch.
#[derive(Debug, Clone)]
pub struct BatchCursor {
    /// Records drawn so far, across resumptions
    pub offset: usize,
    pub page_size: usize,
    /// Set once a batch drew zero records
    pub exhausted: bool,
    progress: Option<WatermarkTracker>,
    drawn: HashSet<RecordIdentity>,
}

impl BatchCursor {
    pub fn new(page_size: usize) -> Result<Self, SyncError> {
        if page_size == 0 {
            return Err(SyncError::invalid_config("page_size must be positive"));
        }
        Ok(Self {
            offset: 0,
            page_size,
            exhausted: false,
            progress: None,
            drawn: HashSet::new(),
        })
    }
}

/// Copy every record matching `predicate` in batches of `page_size`.
///
/// Each batch is fully delivered before the next one is drawn, so at most
/// `page_size` records are held at a time. The loop ends when a batch draws
/// zero records; that empty batch is included in `outcome.batches`.
///
/// `shutdown` is checked between batches. When it is set the run returns
/// early with a non-exhausted cursor and the starting watermark, since the
/// records not yet drawn may carry lower markers than the ones applied.
///
/// A resumed run issues a fresh query and skips, without counting them, the
/// records whose `(updated_at, key)` identity was already drawn. Records that
/// changed or entered the result set during the pause are drawn again, so
/// none are lost to a shifted position. The resumed run continues the
/// watermark bookkeeping of the interrupted run, so `start` is ignored.
pub async fn sync_all_safely<S, K>(
    source: &S,
    sink: &K,
    predicate: &Predicate,
    page_size: usize,
    resume: Option<BatchCursor>,
    start: Watermark,
    shutdown: Option<&watch::Receiver<bool>>,
) -> Result<(SyncOutcome, BatchCursor), SyncError>
where
    S: RecordStore + ?Sized,
    K: EventSink + ?Sized,
{
    let mut cursor = match resume {
        Some(cursor) if cursor.exhausted => {
            return Err(SyncError::invalid_config(
                "cannot resume a batched sync that already finished",
            ));
        }
        Some(cursor) if cursor.page_size != page_size => {
            return Err(SyncError::invalid_config(format!(
                "cursor page size {} does not match configured page size {page_size}",
                cursor.page_size
            )));
        }
        Some(cursor) => cursor,
        None => BatchCursor::new(page_size)?,
    };

    let tracker = cursor
        .progress
        .take()
        .unwrap_or_else(|| WatermarkTracker::unordered(start));

    tracing::info!(
        "Starting batched sync (page size: {page_size}, offset: {}, predicate: {predicate})",
        cursor.offset
    );

    let mut stream = source
        .find(predicate)
        .await
        .map_err(SyncError::source_unavailable)?;

    let names = source.field_names();
    let mut applier = RecordApplier::new(sink, names, tracker);
    let mut batches = 0u64;

    loop {
        if shutdown.is_some_and(|rx| *rx.borrow()) {
            tracing::info!(
                "Batched sync interrupted after {batches} batches at offset {}",
                cursor.offset
            );
            break;
        }

        let mut batch: Vec<Record> = Vec::with_capacity(page_size);
        while batch.len() < page_size {
            match stream.next().await {
                Some(Ok(record)) => {
                    let identity = record.identity(names).ok();
                    if identity.as_ref().is_some_and(|id| cursor.drawn.contains(id)) {
                        continue;
                    }
                    cursor.drawn.extend(identity);
                    batch.push(record);
                }
                Some(Err(e)) => return Err(SyncError::source_unavailable(e)),
                None => break,
            }
        }
        batches += 1;

        if batch.is_empty() {
            cursor.exhausted = true;
            break;
        }

        for record in &batch {
            applier.apply(record).await;
        }
        cursor.offset += batch.len();
        tracing::debug!(
            "Batch {batches} applied {} records (offset now {})",
            batch.len(),
            cursor.offset
        );
    }

    if cursor.exhausted {
        cursor.drawn.clear();
    } else {
        cursor.progress = Some(applier.tracker_snapshot());
    }

    let outcome = applier.finish(Strategy::Batched, batches, !cursor.exhausted);
    tracing::info!(
        "Batched sync {}: {} batches, {} examined, {} applied, {} unchanged, {} failed, {} skipped",
        if cursor.exhausted { "completed" } else { "paused" },
        outcome.batches,
        outcome.records_examined,
        outcome.records_applied,
        outcome.records_unchanged,
        outcome.records_failed,
        outcome.records_skipped
    );
    Ok((outcome, cursor))
}
