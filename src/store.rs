//! Storage collaborator interface.
//!
//! The store owns durable `SketchRecord`s and must provide:
//! - atomic per-record reads
//! - insert that reports, rather than fails on, an id that already exists
//! - update conditioned on the record's current `version`
//!
//! Correctness across service instances relies only on these guarantees; no
//! in-process lock protects records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::record::{MetricKey, RecordId, SketchRecord};

/// Result of inserting a new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Record was created
    Created,
    /// Record with the same id already exists, nothing was written
    Duplicate,
}

#[async_trait]
pub trait SketchStore: Send + Sync {
    /// Return record with given id, if any
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<SketchRecord>, StoreError>;

    /// Return every record of `key` with `window_start` in `[start, end)`
    async fn find_in_range(
        &self,
        key: &MetricKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SketchRecord>, StoreError>;

    /// Insert record unless its id is already taken
    async fn insert(&self, record: SketchRecord) -> Result<InsertOutcome, StoreError>;

    /// Replace blob and bump version by one if the stored version still equals
    /// `expected_version`. Returns `false` when no record was modified.
    async fn update_if_version(
        &self,
        id: &RecordId,
        expected_version: u64,
        blob: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
