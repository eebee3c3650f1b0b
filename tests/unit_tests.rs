use record_sync::{
    BatchCursor, Checkpoint, SessionSummary, Strategy, SyncConfig, SyncError, SyncOutcome,
    Watermark,
};

fn outcome() -> SyncOutcome {
    SyncOutcome {
        strategy: Strategy::Delta,
        records_examined: 4,
        records_applied: 2,
        records_unchanged: 1,
        records_failed: 1,
        records_skipped: 0,
        batches: 1,
        new_watermark: Watermark::from_cli_string("2024-06-15T14:30:00Z,GE").unwrap(),
    }
}

#[test]
fn test_outcome_counters() {
    let outcome = outcome();
    assert_eq!(outcome.records_confirmed(), 3);
    assert!(outcome.has_failures());
    assert_eq!(outcome.strategy.to_string(), "delta");
}

#[test]
fn test_outcome_json_uses_cli_watermark() {
    let rendered = serde_json::to_value(outcome()).unwrap();
    assert_eq!(rendered["strategy"], "delta");
    assert_eq!(rendered["records_applied"], 2);
    assert_eq!(rendered["new_watermark"], "2024-06-15T14:30:00Z,GE");
}

#[test]
fn test_batch_cursor_creation() {
    let cursor = BatchCursor::new(10).unwrap();
    assert_eq!(cursor.offset, 0);
    assert_eq!(cursor.page_size, 10);
    assert!(!cursor.exhausted);

    assert!(matches!(
        BatchCursor::new(0),
        Err(SyncError::InvalidConfig(_))
    ));
}

#[test]
fn test_session_summary_display() {
    let summary = SessionSummary {
        ticks: 5,
        ticks_skipped: 1,
        records_applied: 3,
        ..Default::default()
    };
    let text = summary.to_string();
    assert!(text.starts_with("5 ticks (1 skipped, 0 failed)"));
    assert!(text.ends_with("watermark origin"));
}

#[test]
fn test_default_config_is_valid() {
    let config = SyncConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.page_size, 100);
}
