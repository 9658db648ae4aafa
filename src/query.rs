//! Range queries over persisted day-bucket records.
//!
//! Read-only: every covering record is loaded, decoded and merged into one working
//! sketch. Merge being commutative and associative, queries may run concurrently with
//! ingestion and flushing without coordination.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{QueryError, SketchError};
use crate::record::MetricKey;
use crate::sketch::Sketch;
use crate::store::SketchStore;

/// Merges stored sketches covering a time range
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn SketchStore>,
    precision: u8,
    timeout: Option<Duration>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn SketchStore>, precision: u8, timeout: Option<Duration>) -> Self {
        Self {
            store,
            precision,
            timeout,
        }
    }

    /// Return distinct count estimate of `key` over records with `window_start` in
    /// `[start, end)`. A range without records estimates to zero.
    pub async fn estimate(
        &self,
        key: &MetricKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, QueryError> {
        let merged = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.merged_sketch(key, start, end))
                .await
                .map_err(|_| QueryError::Timeout(limit))??,
            None => self.merged_sketch(key, start, end).await?,
        };
        Ok(merged.map_or(0, |sketch| sketch.estimate()))
    }

    /// Return union of every usable record in range, `None` when there is none.
    ///
    /// Records with a corrupt blob are skipped. A record of a different precision is a
    /// configuration error and fails the whole query.
    pub async fn merged_sketch(
        &self,
        key: &MetricKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Sketch>, QueryError> {
        let records = self.store.find_in_range(key, start, end).await?;

        let mut merged: Option<Sketch> = None;
        for record in records {
            if record.precision != self.precision {
                return Err(SketchError::PrecisionMismatch {
                    expected: self.precision,
                    actual: record.precision,
                }
                .into());
            }
            let sketch = match record.sketch() {
                Ok(sketch) => sketch,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "skipping corrupt sketch record");
                    continue;
                }
            };
            match merged.as_mut() {
                Some(acc) => acc.merge(&sketch)?,
                None => merged = Some(sketch),
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::record::{DayBucket, SketchRecord};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn put_day(store: &MemoryStore, key: &MetricKey, day: &str, prefix: &str, n: usize) {
        let now = ts(&format!("{day}T12:00:00Z"));
        let mut sketch = Sketch::new(14).unwrap();
        for i in 0..n {
            sketch.add(&format!("{prefix}_{i}"));
        }
        store.put(SketchRecord::new(key, DayBucket::containing(now), &sketch, now));
    }

    fn engine(store: Arc<MemoryStore>) -> QueryEngine {
        QueryEngine::new(store, 14, None)
    }

    #[tokio::test]
    async fn test_empty_range_is_zero() {
        let store = Arc::new(MemoryStore::new());
        let key = MetricKey::new("dau", None).unwrap();
        put_day(&store, &key, "2023-10-27", "user", 100);

        let estimate = engine(store)
            .estimate(&key, ts("2023-11-01T00:00:00Z"), ts("2023-11-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(estimate, 0);
    }

    #[tokio::test]
    async fn test_multi_day_union() {
        let store = Arc::new(MemoryStore::new());
        let key = MetricKey::new("dau", None).unwrap();
        // overlapping users across days are counted once
        put_day(&store, &key, "2023-10-26", "user", 2_000);
        put_day(&store, &key, "2023-10-27", "user", 3_000);
        put_day(&store, &key, "2023-10-28", "other", 1_000);
        let engine = engine(store);

        let two_days = engine
            .estimate(&key, ts("2023-10-26T00:00:00Z"), ts("2023-10-28T00:00:00Z"))
            .await
            .unwrap();
        assert!((2_940..=3_060).contains(&two_days), "estimate = {}", two_days);

        let three_days = engine
            .estimate(&key, ts("2023-10-26T00:00:00Z"), ts("2023-10-29T00:00:00Z"))
            .await
            .unwrap();
        assert!((3_920..=4_080).contains(&three_days), "estimate = {}", three_days);
    }

    #[tokio::test]
    async fn test_other_dimensions_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let us = MetricKey::new("dau", Some("US")).unwrap();
        let eu = MetricKey::new("dau", Some("EU")).unwrap();
        put_day(&store, &us, "2023-10-27", "us", 100);
        put_day(&store, &eu, "2023-10-27", "eu", 500);

        let estimate = engine(store)
            .estimate(&us, ts("2023-10-27T00:00:00Z"), ts("2023-10-28T00:00:00Z"))
            .await
            .unwrap();
        assert!((95..=105).contains(&estimate), "estimate = {}", estimate);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let key = MetricKey::new("dau", None).unwrap();
        put_day(&store, &key, "2023-10-26", "user", 100);
        let now = ts("2023-10-27T12:00:00Z");
        let mut corrupt =
            SketchRecord::new(&key, DayBucket::containing(now), &Sketch::new(14).unwrap(), now);
        corrupt.blob.truncate(10);
        store.put(corrupt);

        let estimate = engine(store)
            .estimate(&key, ts("2023-10-26T00:00:00Z"), ts("2023-10-28T00:00:00Z"))
            .await
            .unwrap();
        assert!((95..=105).contains(&estimate), "estimate = {}", estimate);
    }

    #[tokio::test]
    async fn test_precision_mismatch_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        let key = MetricKey::new("dau", None).unwrap();
        let now = ts("2023-10-27T12:00:00Z");
        store.put(SketchRecord::new(
            &key,
            DayBucket::containing(now),
            &Sketch::new(10).unwrap(),
            now,
        ));

        let result = engine(store)
            .estimate(&key, ts("2023-10-27T00:00:00Z"), ts("2023-10-28T00:00:00Z"))
            .await;
        assert!(matches!(
            result,
            Err(QueryError::Sketch(SketchError::PrecisionMismatch {
                expected: 14,
                actual: 10
            }))
        ));
    }
}
