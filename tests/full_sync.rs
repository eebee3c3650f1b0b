//! Full sync (single query, unbounded) tests.

mod common;

use common::{company, init_tracing, seeded_source, snapshot, target, FailingSink, FlakyStore};
use record_sync::{
    sync_all_no_limit, FieldNames, MemoryStore, Predicate, RecordStore, Strategy, SyncError,
    Watermark,
};

#[tokio::test]
async fn test_full_sync_copies_every_record() -> anyhow::Result<()> {
    init_tracing();
    let source = seeded_source();
    let (target_store, sink) = target();

    let outcome = sync_all_no_limit(&source, &sink, &Predicate::All, Watermark::origin()).await?;

    assert_eq!(outcome.strategy, Strategy::Full);
    assert_eq!(outcome.records_examined, 3);
    assert_eq!(outcome.records_applied, 3);
    assert_eq!(outcome.batches, 1);
    assert_eq!(snapshot(&target_store), snapshot(&source));

    let google = source.find_one("Google").await?.unwrap();
    let names = FieldNames::default();
    assert_eq!(
        outcome.new_watermark,
        Watermark::at_identity(&google.identity(&names)?)
    );
    Ok(())
}

#[tokio::test]
async fn test_full_sync_applies_only_matching_records() -> anyhow::Result<()> {
    let source = seeded_source();
    source.insert(company("Acme", "nobody", 1))?;
    let (target_store, sink) = target();

    let outcome = sync_all_no_limit(
        &source,
        &sink,
        &Predicate::contains("owner", "t"),
        Watermark::origin(),
    )
    .await?;

    assert_eq!(outcome.records_applied, 3);
    assert!(target_store.find_one("Acme").await?.is_none());
    assert!(target_store.find_one("Exxon").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_full_sync_continues_past_failed_record() -> anyhow::Result<()> {
    init_tracing();
    let source = seeded_source();
    let (target_store, inner) = target();
    let sink = FailingSink::new(inner);
    sink.fail_key("GE");

    let outcome = sync_all_no_limit(&source, &sink, &Predicate::All, Watermark::origin()).await?;

    assert_eq!(outcome.records_applied, 2);
    assert_eq!(outcome.records_failed, 1);
    assert!(outcome.has_failures());
    assert_eq!(target_store.len()?, 2);
    // GE sorts below everything that was applied
    assert_eq!(outcome.new_watermark, Watermark::origin());
    Ok(())
}

#[tokio::test]
async fn test_full_sync_skips_malformed_records() -> anyhow::Result<()> {
    let source = MemoryStore::new(FieldNames::default());
    source.insert(company("GE", "test", 1).with("updatedAt", "2024-01-01T00:00:00Z"))?;
    source.insert(company("Exxon", "test2", 2))?;
    let (target_store, sink) = target();

    let outcome = sync_all_no_limit(&source, &sink, &Predicate::All, Watermark::origin()).await?;

    assert_eq!(outcome.records_examined, 2);
    assert_eq!(outcome.records_applied, 1);
    assert_eq!(outcome.records_skipped, 1);
    assert!(target_store.find_one("Exxon").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_full_sync_source_outage_aborts() -> anyhow::Result<()> {
    let source = FlakyStore::new(seeded_source());
    source.fail_next_reads(1);
    let (target_store, sink) = target();

    let err = sync_all_no_limit(&source, &sink, &Predicate::All, Watermark::origin())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::StoreUnavailable { store: "source", .. }));
    assert!(err.is_retryable());
    assert!(target_store.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn test_full_sync_stream_error_aborts_before_applying() -> anyhow::Result<()> {
    let source = FlakyStore::new(seeded_source());
    source.break_streams_after(2);
    let (target_store, sink) = target();

    let result = sync_all_no_limit(&source, &sink, &Predicate::All, Watermark::origin()).await;

    assert!(matches!(result, Err(SyncError::StoreUnavailable { .. })));
    assert!(target_store.is_empty()?);
    Ok(())
}
