//! JSON Lines file store.
//!
//! One record per line. Every query re-opens and re-reads the file, so edits
//! made by other processes between two queries are picked up; the file is the
//! only state.
//!
//! Writes rewrite the whole file (sibling temp file, then rename), which keeps
//! readers from observing a half-written file but makes each upsert cost a full
//! pass. Suitable for small datasets and the CLI, not for bulk targets.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use sync_core::{FieldNames, Predicate, Record};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::{RecordStore, RecordStream, StoreError};

pub struct JsonlStore {
    path: PathBuf,
    names: FieldNames,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open a store over `path`. A missing file is an empty store.
    pub fn new(path: impl Into<PathBuf>, names: FieldNames) -> Self {
        Self {
            path: path.into(),
            names,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<Option<File>, StoreError> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Read every record in file order.
    pub async fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let Some(file) = self.open().await? else {
            return Ok(Vec::new());
        };
        let mut cursor = LineCursor::new(file, Predicate::All);
        let mut records = Vec::new();
        while let Some(record) = cursor.next_match().await {
            records.push(record?);
        }
        Ok(records)
    }

    async fn write_all(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path).await?;
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| StoreError::Rejected {
                key: record.key(&self.names).unwrap_or_default(),
                message: e.to_string(),
            })?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// Streaming reader over the lines of one query.
struct LineCursor {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    predicate: Predicate,
    done: bool,
}

impl LineCursor {
    fn new(file: File, predicate: Predicate) -> Self {
        Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            predicate,
            done: false,
        }
    }

    async fn next_match(&mut self) -> Option<Result<Record, StoreError>> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(StoreError::Io(e)));
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line, self.line_no) {
                Ok(record) if self.predicate.matches(&record) => return Some(Ok(record)),
                Ok(_) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<Record, StoreError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| StoreError::Parse {
        line: line_no,
        message: e.to_string(),
    })?;
    Record::from_value(value).map_err(|e| StoreError::Parse {
        line: line_no,
        message: e.to_string(),
    })
}

#[async_trait]
impl RecordStore for JsonlStore {
    fn field_names(&self) -> &FieldNames {
        &self.names
    }

    async fn find(&self, predicate: &Predicate) -> Result<RecordStream<'_>, StoreError> {
        let Some(file) = self.open().await? else {
            return Ok(futures::stream::empty().boxed());
        };

        let cursor = LineCursor::new(file, predicate.clone());
        let stream = futures::stream::unfold(cursor, |mut cursor| async move {
            let item = cursor.next_match().await?;
            Some((item, cursor))
        });
        Ok(stream.boxed())
    }

    async fn find_one(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let records = self.load_all().await?;
        Ok(records
            .into_iter()
            .find(|r| r.key(&self.names).ok().as_deref() == Some(key)))
    }

    async fn insert_or_update(&self, record: Record) -> Result<(), StoreError> {
        let key = record.key(&self.names)?;
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_all().await?;
        match records
            .iter()
            .position(|r| r.key(&self.names).ok().as_deref() == Some(key.as_str()))
        {
            Some(position) => records[position] = record,
            None => records.push(record),
        }

        tracing::debug!("Rewriting {} with {} records", self.path.display(), records.len());
        self.write_all(&records).await
    }
}
