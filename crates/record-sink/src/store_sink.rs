use std::sync::atomic::{AtomicU64, Ordering};

use record_store::RecordStore;
use sync_core::Record;
use tokio::sync::broadcast;

use crate::{Delivery, EventSink, SinkError};

/// Sink that upserts records into a target store.
///
/// A write is confirmed before subscribers are notified. Notification is
/// best-effort: lagging or absent subscribers never fail a delivery.
pub struct StoreSink<T> {
    target: T,
    delivered: AtomicU64,
    notifier: Option<broadcast::Sender<Record>>,
}

impl<T: RecordStore> StoreSink<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            delivered: AtomicU64::new(0),
            notifier: None,
        }
    }

    /// Broadcast every applied record to subscribers.
    pub fn with_notifier(mut self, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        self.notifier = Some(tx);
        self
    }

    /// Subscribe to applied records. `None` unless built `with_notifier`.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Record>> {
        self.notifier.as_ref().map(|tx| tx.subscribe())
    }

    pub fn target(&self) -> &T {
        &self.target
    }
}

#[async_trait::async_trait]
impl<T: RecordStore> EventSink for StoreSink<T> {
    async fn deliver(&self, record: &Record) -> Result<Delivery, SinkError> {
        let identity = record.identity(self.target.field_names())?;

        let existing = self
            .target
            .find_one(&identity.key)
            .await
            .map_err(|source| SinkError::Write {
                key: identity.key.clone(),
                source,
            })?;
        if existing.as_ref() == Some(record) {
            tracing::trace!("Record {identity} already up to date in target");
            return Ok(Delivery::Unchanged);
        }

        self.target
            .insert_or_update(record.clone())
            .await
            .map_err(|source| SinkError::Write {
                key: identity.key.clone(),
                source,
            })?;

        if let Some(tx) = &self.notifier {
            // No receivers is not an error
            let _ = tx.send(record.clone());
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Delivered record {identity}");
        Ok(Delivery::Applied)
    }

    fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_store::MemoryStore;
    use serde_json::json;
    use sync_core::FieldNames;

    fn company(name: &str, owner: &str, updated_at: &str) -> Record {
        Record::new()
            .with("name", name)
            .with("owner", owner)
            .with("updatedAt", updated_at)
    }

    #[tokio::test]
    async fn test_deliver_applies_then_reports_unchanged() {
        let target = MemoryStore::new(FieldNames::default());
        let sink = StoreSink::new(target.clone());
        let ge = company("GE", "test", "2024-01-01T00:00:00Z");

        assert_eq!(sink.deliver(&ge).await.unwrap(), Delivery::Applied);
        assert_eq!(sink.deliver(&ge).await.unwrap(), Delivery::Unchanged);
        assert_eq!(sink.delivered(), 1);
        assert_eq!(target.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deliver_overwrites_newer_version() {
        let target = MemoryStore::new(FieldNames::default());
        let sink = StoreSink::new(target.clone());

        sink.deliver(&company("GE", "test", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        let outcome = sink
            .deliver(&company("GE", "test4", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(outcome, Delivery::Applied);
        let stored = target.find_one("GE").await.unwrap().unwrap();
        assert_eq!(stored.get("owner"), Some(&json!("test4")));
        assert_eq!(sink.delivered(), 2);
    }

    #[tokio::test]
    async fn test_malformed_record_is_not_written() {
        let target = MemoryStore::new(FieldNames::default());
        let sink = StoreSink::new(target.clone());

        let err = sink
            .deliver(&Record::new().with("name", "GE"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Malformed(_)));
        assert!(err.key().is_none());
        assert!(target.is_empty().unwrap());
        assert_eq!(sink.delivered(), 0);
    }

    #[tokio::test]
    async fn test_notifier_sees_applied_records_only() {
        let sink = StoreSink::new(MemoryStore::new(FieldNames::default())).with_notifier(8);
        let mut rx = sink.subscribe().unwrap();
        let ge = company("GE", "test", "2024-01-01T00:00:00Z");

        sink.deliver(&ge).await.unwrap();
        sink.deliver(&ge).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), ge);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notifier_without_subscribers_does_not_fail() {
        let sink = StoreSink::new(MemoryStore::new(FieldNames::default())).with_notifier(1);
        for owner in ["a", "b", "c"] {
            let outcome = sink
                .deliver(&company("GE", owner, "2024-01-01T00:00:00Z"))
                .await
                .unwrap();
            assert_eq!(outcome, Delivery::Applied);
        }
        assert!(StoreSink::new(MemoryStore::new(FieldNames::default()))
            .subscribe()
            .is_none());
    }
}
