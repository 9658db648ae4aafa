//! ## Flush protocol
//! Moves buffered sketches into the store with optimistic concurrency.
//!
//! A cycle detaches the whole buffer, then for every key runs a bounded
//! read-merge-write loop against the record of the current UTC day:
//! - record absent  - insert it with `version = 0`; a duplicate id means another
//!   flush won the race, the attempt is spent and the loop reads again
//! - record present - merge the stored sketch with the local one and write it back
//!   conditioned on the version read; a lost race spends the attempt
//!
//! A key that runs out of attempts is abandoned for the cycle. Its contribution is
//! dropped unless re-buffering is enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::buffer::IngestBuffer;
use crate::error::FlushError;
use crate::record::{DayBucket, MetricKey, SketchRecord};
use crate::sketch::Sketch;
use crate::store::{InsertOutcome, SketchStore};

/// Result of merging one buffered sketch into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New record created with `version = 0`
    Inserted,
    /// Existing record merged, now at `version`
    Merged { version: u64 },
    /// Every attempt lost a race
    Exhausted { attempts: u32 },
}

/// Summary of one flush cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub keys: usize,
    pub inserted: usize,
    pub merged: usize,
    pub exhausted: usize,
    pub failed: usize,
    /// Exhausted entries merged back into the live buffer
    pub requeued: usize,
}

/// Run the read-merge-write loop for `local` against the record of `key` and `bucket`
pub async fn merge_into_store(
    store: &dyn SketchStore,
    key: &MetricKey,
    bucket: DayBucket,
    local: &Sketch,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, FlushError> {
    let id = key.record_id(bucket);

    for attempt in 1..=max_attempts {
        match store.find_by_id(&id).await? {
            None => {
                let record = SketchRecord::new(key, bucket, local, now);
                match store.insert(record).await? {
                    InsertOutcome::Created => return Ok(MergeOutcome::Inserted),
                    InsertOutcome::Duplicate => {
                        debug!(record_id = %id, attempt, "record created concurrently");
                    }
                }
            }
            Some(record) => {
                let mut merged = record.sketch()?;
                merged.merge(local)?;
                if store
                    .update_if_version(&id, record.version, merged.to_bytes(), now)
                    .await?
                {
                    return Ok(MergeOutcome::Merged {
                        version: record.version + 1,
                    });
                }
                debug!(record_id = %id, attempt, version = record.version, "version conflict");
            }
        }
    }

    Ok(MergeOutcome::Exhausted {
        attempts: max_attempts,
    })
}

/// Drains the ingestion buffer into the store, one cycle at a time
pub struct Flusher {
    buffer: Arc<IngestBuffer>,
    store: Arc<dyn SketchStore>,
    max_attempts: u32,
    rebuffer_on_exhaustion: bool,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the cycle ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Flusher {
    pub fn new(
        buffer: Arc<IngestBuffer>,
        store: Arc<dyn SketchStore>,
        max_attempts: u32,
        rebuffer_on_exhaustion: bool,
    ) -> Self {
        Self {
            buffer,
            store,
            max_attempts,
            rebuffer_on_exhaustion,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Return whether a cycle is currently running
    pub fn is_flushing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle bucketed at the current time
    pub async fn flush(&self) -> Option<FlushReport> {
        self.flush_at(Utc::now()).await
    }

    /// Run one cycle bucketed at the day of `now`.
    ///
    /// Returns `None` without doing anything when another cycle is still running.
    pub async fn flush_at(&self, now: DateTime<Utc>) -> Option<FlushReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("flush already in progress, skipping");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        let entries = self.buffer.detach();
        let mut report = FlushReport {
            keys: entries.len(),
            ..FlushReport::default()
        };
        if entries.is_empty() {
            return Some(report);
        }

        let bucket = DayBucket::containing(now);
        for (key, local) in entries {
            let outcome = merge_into_store(
                self.store.as_ref(),
                &key,
                bucket,
                &local,
                self.max_attempts,
                now,
            )
            .await;

            match outcome {
                Ok(MergeOutcome::Inserted) => {
                    debug!(key = %key, day = %bucket, "sketch record created");
                    report.inserted += 1;
                }
                Ok(MergeOutcome::Merged { version }) => {
                    debug!(key = %key, day = %bucket, version, "sketch record merged");
                    report.merged += 1;
                }
                Ok(MergeOutcome::Exhausted { attempts }) => {
                    error!(key = %key, day = %bucket, attempts, "failed to flush sketch after retries");
                    report.exhausted += 1;
                    if self.rebuffer_on_exhaustion {
                        match self.buffer.restore(key, &local) {
                            Ok(()) => report.requeued += 1,
                            Err(e) => warn!(error = %e, "failed to re-buffer sketch"),
                        }
                    }
                }
                Err(FlushError::Sketch(e)) => {
                    warn!(key = %key, day = %bucket, error = %e, "stored sketch unusable, skipping key");
                    report.failed += 1;
                }
                Err(FlushError::Store(e)) => {
                    error!(key = %key, day = %bucket, error = %e, "error flushing sketch");
                    report.failed += 1;
                }
            }
        }

        info!(
            keys = report.keys,
            inserted = report.inserted,
            merged = report.merged,
            exhausted = report.exhausted,
            failed = report.failed,
            requeued = report.requeued,
            "flush cycle finished"
        );
        Some(report)
    }
}
