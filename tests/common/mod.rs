//! Shared fixtures for record-sync integration tests.
//!
//! Provides the GE/Exxon/Google source dataset and fault-injecting wrappers
//! around stores and sinks.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use record_sync::{
    Delivery, EventSink, FieldNames, MemoryStore, Predicate, Record, RecordStore, RecordStream,
    SinkError, StoreError, StoreSink,
};
use serde_json::{json, Map};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("record_sync=debug,checkpoint=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn company(name: &str, owner: &str, amount: i64) -> Record {
    Record::new()
        .with("name", name)
        .with("owner", owner)
        .with("amount", amount)
}

/// Source store stamping `createdAt`/`updatedAt` on every write.
pub fn source_store() -> MemoryStore {
    MemoryStore::new(FieldNames::default()).with_timestamps()
}

/// GE, Exxon and Google, inserted in that order with increasing markers.
pub fn seeded_source() -> MemoryStore {
    let source = source_store();
    source.insert(company("GE", "test", 1_000_000)).unwrap();
    source.insert(company("Exxon", "test2", 5_000_000)).unwrap();
    source.insert(company("Google", "test3", 5_000_001)).unwrap();
    source
}

/// Source with `n` records named `company-00`, `company-01`, ...
pub fn numbered_source(n: usize) -> MemoryStore {
    let source = source_store();
    for i in 0..n {
        source
            .insert(company(&format!("company-{i:02}"), "test", i as i64))
            .unwrap();
    }
    source
}

/// Empty target plus a sink writing into it. The store handle shares data
/// with the one inside the sink.
pub fn target() -> (MemoryStore, StoreSink<MemoryStore>) {
    let target = MemoryStore::new(FieldNames::default());
    (target.clone(), StoreSink::new(target))
}

/// Set the owner of a source record, re-stamping its change marker.
pub fn touch(source: &MemoryStore, name: &str, owner: &str) -> Record {
    let mut set = Map::new();
    set.insert("owner".to_string(), json!(owner));
    source.update(name, set).unwrap().unwrap()
}

/// Target records keyed and sorted by natural key, for content comparison.
pub fn snapshot(store: &MemoryStore) -> Vec<(String, Record)> {
    let names = FieldNames::default();
    let mut records: Vec<_> = store
        .records()
        .unwrap()
        .into_iter()
        .map(|r| (r.key(&names).unwrap(), r))
        .collect();
    records.sort_by(|a, b| a.0.cmp(&b.0));
    records
}

/// Store wrapper that fails reads on demand.
///
/// Clones share the failure counters, so a test can keep a handle on a store
/// moved into a synchronizer.
#[derive(Clone)]
pub struct FlakyStore<S> {
    inner: S,
    failing_reads: Arc<AtomicU32>,
    /// Fail the stream after yielding this many records (0 = never)
    break_stream_after: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
}

impl<S: RecordStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_reads: Arc::new(AtomicU32::new(0)),
            break_stream_after: Arc::new(AtomicU32::new(0)),
            reads: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make the next `n` queries fail with `StoreError::Unavailable`.
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Make every query stream error out after `n` records.
    pub fn break_streams_after(&self, n: u32) {
        self.break_stream_after.store(n, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FlakyStore<S> {
    fn field_names(&self) -> &FieldNames {
        self.inner.field_names()
    }

    async fn find(&self, predicate: &Predicate) -> Result<RecordStream<'_>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::unavailable("injected outage"));
        }

        let stream = self.inner.find(predicate).await?;
        match self.break_stream_after.load(Ordering::SeqCst) {
            0 => Ok(stream),
            n => Ok(stream
                .take(n as usize)
                .chain(futures::stream::once(async {
                    Err(StoreError::unavailable("connection reset mid-stream"))
                }))
                .boxed()),
        }
    }

    async fn find_one(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.inner.find_one(key).await
    }

    async fn insert_or_update(&self, record: Record) -> Result<(), StoreError> {
        self.inner.insert_or_update(record).await
    }
}

/// Sink wrapper that rejects chosen keys and can slow every delivery down.
pub struct FailingSink<K> {
    inner: K,
    failing_keys: Arc<Mutex<HashSet<String>>>,
    delay: Option<Duration>,
}

impl<K: EventSink> FailingSink<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            failing_keys: Arc::new(Mutex::new(HashSet::new())),
            delay: None,
        }
    }

    /// Sleep (on the tokio clock) before every delivery.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing_keys.lock().unwrap().clear();
    }

    /// Handle for toggling failures after the sink has been moved.
    pub fn failing_keys(&self) -> Arc<Mutex<HashSet<String>>> {
        Arc::clone(&self.failing_keys)
    }
}

#[async_trait]
impl<K: EventSink> EventSink for FailingSink<K> {
    async fn deliver(&self, record: &Record) -> Result<Delivery, SinkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = record.key(&FieldNames::default())?;
        if self.failing_keys.lock().unwrap().contains(&key) {
            return Err(SinkError::Write {
                key: key.clone(),
                source: StoreError::Rejected {
                    key,
                    message: "injected write failure".to_string(),
                },
            });
        }
        self.inner.deliver(record).await
    }

    fn delivered(&self) -> u64 {
        self.inner.delivered()
    }
}
