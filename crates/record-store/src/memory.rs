//! In-memory record store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::{Map, Value};
use sync_core::{FieldNames, Predicate, Record};

use crate::{RecordStore, RecordStream, StoreError};

/// Insertion-ordered in-memory store.
///
/// Cloning is cheap and every clone shares the same data, so a test can keep
/// a handle on a store that has been moved into a sink.
///
/// # Timestamp Data
///
/// With [`MemoryStore::with_timestamps`], `insert` stamps `createdAt` and the
/// change marker, and `update` re-stamps the change marker. Stamps have
/// millisecond precision and strictly increase across the store, even when
/// the wall clock does not move between two writes. `insert_or_update` never
/// stamps: a replication target stores what it is given.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    names: FieldNames,
    timestamp_data: bool,
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    index: HashMap<String, usize>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    fn reindex(&mut self, names: &FieldNames) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.key(names).ok().map(|k| (k, i)))
            .collect();
    }

    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

impl MemoryStore {
    pub fn new(names: FieldNames) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            names,
            timestamp_data: false,
        }
    }

    /// Enable automatic `createdAt`/change-marker stamping on `insert` and `update`.
    pub fn with_timestamps(mut self) -> Self {
        self.timestamp_data = true;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    /// Insert a new record, failing if its key already exists.
    ///
    /// Returns the record as stored (including stamps).
    pub fn insert(&self, mut record: Record) -> Result<Record, StoreError> {
        let key = record.key(&self.names)?;
        let mut inner = self.write()?;

        if inner.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey { key });
        }

        if self.timestamp_data {
            let stamp = inner.next_stamp();
            if record.get("createdAt").is_none() {
                record.set("createdAt", sync_core::record::format_marker(&stamp));
            }
            record.set_updated_at(&self.names, stamp);
        }

        let position = inner.records.len();
        inner.records.push(record.clone());
        inner.index.insert(key, position);
        Ok(record)
    }

    /// Merge `set` into the record with the given key.
    ///
    /// Returns the updated record, or `None` if the key is absent. A `set`
    /// that renames the record fails with `DuplicateKey` if the new key is
    /// taken, and leaves the store untouched on any error.
    pub fn update(
        &self,
        key: &str,
        set: Map<String, Value>,
    ) -> Result<Option<Record>, StoreError> {
        let mut inner = self.write()?;
        let Some(&position) = inner.index.get(key) else {
            return Ok(None);
        };

        let mut record = inner.records[position].clone();
        for (field, value) in set {
            record.set(field, value);
        }
        let new_key = record.key(&self.names)?;
        if new_key != key {
            if inner.index.contains_key(&new_key) {
                return Err(StoreError::DuplicateKey { key: new_key });
            }
            inner.index.remove(key);
            inner.index.insert(new_key, position);
        }

        if self.timestamp_data {
            let stamp = inner.next_stamp();
            record.set_updated_at(&self.names, stamp);
        }
        inner.records[position] = record.clone();
        Ok(Some(record))
    }

    /// Delete the record with the given key.
    pub fn remove(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let mut inner = self.write()?;
        let Some(position) = inner.index.remove(key) else {
            return Ok(None);
        };
        let removed = inner.records.remove(position);
        inner.reindex(&self.names);
        Ok(Some(removed))
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.read()?.records.clone())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn field_names(&self) -> &FieldNames {
        &self.names
    }

    async fn find(&self, predicate: &Predicate) -> Result<RecordStream<'_>, StoreError> {
        let matching: Vec<Record> = self
            .read()?
            .records
            .iter()
            .filter(|record| predicate.matches(record))
            .cloned()
            .collect();

        Ok(futures::stream::iter(matching.into_iter().map(Ok)).boxed())
    }

    async fn find_one(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .index
            .get(key)
            .map(|&position| inner.records[position].clone()))
    }

    async fn insert_or_update(&self, record: Record) -> Result<(), StoreError> {
        let key = record.key(&self.names)?;
        let mut inner = self.write()?;

        let existing = inner.index.get(&key).copied();
        match existing {
            Some(position) => inner.records[position] = record,
            None => {
                let position = inner.records.len();
                inner.records.push(record);
                inner.index.insert(key, position);
            }
        }
        Ok(())
    }
}
