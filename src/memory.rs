//! In-process `SketchStore`.
//!
//! Keeps records in a `BTreeMap` behind a mutex, so every operation is atomic with
//! respect to the others. Useful for tests, single-node deployments and as the
//! reference behaviour for durable backends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::record::{MetricKey, RecordId, SketchRecord};
use crate::store::{InsertOutcome, SketchStore};

/// Mutex-guarded in-memory record store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordId, SketchRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Return copy of record with given id
    pub fn get(&self, id: &RecordId) -> Option<SketchRecord> {
        self.records.lock().get(id).cloned()
    }

    /// Put record as is, replacing any record with the same id
    pub fn put(&self, record: SketchRecord) {
        self.records.lock().insert(record.id.clone(), record);
    }

    /// Delete records past their retention period, returning how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.expires_at() > now);
        before - records.len()
    }
}

#[async_trait]
impl SketchStore for MemoryStore {
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<SketchRecord>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_in_range(
        &self,
        key: &MetricKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SketchRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.metric == key.metric() && r.dimension == key.dimension())
            .filter(|r| r.window_start >= start && r.window_start < end)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: SketchRecord) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Ok(InsertOutcome::Duplicate);
        }
        records.insert(record.id.clone(), record);
        Ok(InsertOutcome::Created)
    }

    async fn update_if_version(
        &self,
        id: &RecordId,
        expected_version: u64,
        blob: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        match records.get_mut(id) {
            Some(record) if record.version == expected_version => {
                record.blob = blob;
                record.version += 1;
                record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
