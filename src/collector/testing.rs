//! Test doubles shared by the collector and service tests.

use crate::event::EventRecord;
use crate::storage::{EventStore, StorageError};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory [`EventStore`] that records how it was called.
#[derive(Default)]
pub struct StubStore {
    stored: Mutex<HashSet<String>>,
    fail_lookups: bool,
    fail_writes: AtomicBool,
    lookups: AtomicUsize,
    lookup_sizes: Mutex<Vec<usize>>,
    writes: AtomicUsize,
    closed: AtomicBool,
}

impl StubStore {
    pub fn with_existing<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stored: Mutex::new(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn lookup_sizes(&self) -> Vec<usize> {
        self.lookup_sizes.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> HashSet<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for StubStore {
    fn name(&self) -> &str {
        "stub"
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn existing_ids(&self, event_ids: &[String]) -> Result<HashSet<String>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup_sizes.lock().unwrap().push(event_ids.len());

        if self.fail_lookups {
            return Err(StorageError::Database("connection refused".to_string()));
        }

        let stored = self.stored.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter(|id| stored.contains(*id))
            .cloned()
            .collect())
    }

    async fn write_events(&self, events: &[EventRecord]) -> Result<usize, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Database("disk full".to_string()));
        }

        let mut stored = self.stored.lock().unwrap();
        stored.extend(events.iter().map(|e| e.event_id.clone()));
        Ok(events.len())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn entry(id: &str) -> Value {
    json!({
        "eventID": id,
        "eventVersion": "1.08",
        "eventName": "ConsoleLogin",
        "eventSource": "signin.amazonaws.com",
        "eventTime": "2025-09-03T00:00:10Z",
        "awsRegion": "ap-northeast-2",
        "sourceIPAddress": "203.0.113.7",
        "userIdentity": {"type": "Root", "accountId": "123456789012"}
    })
}

pub fn record(id: &str) -> EventRecord {
    serde_json::from_value(entry(id)).unwrap()
}

/// Gzipped `{"Records": [...]}` with one entry per id.
pub fn log_object(ids: &[&str]) -> Vec<u8> {
    let records: Vec<Value> = ids.iter().map(|id| entry(id)).collect();
    gzip_body(&json!({ "Records": records }))
}

pub fn gzip_body(body: &Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serde_json::to_string(body).unwrap().as_bytes())
        .unwrap();
    encoder.finish().unwrap()
}

/// Object key under `trail/` stamped 2025-09-03 `hh:mm` UTC.
pub fn log_key(account: &str, h: u32, m: u32) -> String {
    format!("trail/{account}_CloudTrail_ap-northeast-2_20250903T{h:02}{m:02}Z_x.json.gz")
}
