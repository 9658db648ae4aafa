//! The two operations exposed to collaborators: `ingest` and `query`.
//!
//! `AnalyticsService` owns the ingestion buffer and shares the store with its flusher
//! and query engine. Several services (in one or many processes) may share a store;
//! their writes reconcile through the store's version-conditioned updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::buffer::IngestBuffer;
use crate::config::AnalyticsConfig;
use crate::error::{ConfigError, InputError, QueryError};
use crate::flush::{FlushReport, Flusher};
use crate::query::QueryEngine;
use crate::record::MetricKey;
use crate::scheduler::FlushScheduler;
use crate::store::SketchStore;

/// Distinct-count analytics service
pub struct AnalyticsService {
    config: AnalyticsConfig,
    buffer: Arc<IngestBuffer>,
    flusher: Arc<Flusher>,
    queries: QueryEngine,
}

impl AnalyticsService {
    /// Create service on top of `store` after validating `config`
    pub fn new(store: Arc<dyn SketchStore>, config: AnalyticsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = Arc::new(IngestBuffer::new(config.precision)?);
        let flusher = Arc::new(Flusher::new(
            buffer.clone(),
            store.clone(),
            config.max_flush_attempts,
            config.rebuffer_on_exhaustion,
        ));
        let queries = QueryEngine::new(store, config.precision, config.query_timeout);
        Ok(Self {
            config,
            buffer,
            flusher,
            queries,
        })
    }

    #[inline]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Record `value` as seen for `metric` and `dimension` (`"global"` when absent).
    ///
    /// Only updates the in-memory buffer and never waits on the store.
    pub fn ingest<T: AsRef<[u8]> + ?Sized>(
        &self,
        metric: &str,
        dimension: Option<&str>,
        value: &T,
    ) -> Result<(), InputError> {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(InputError::EmptyValue);
        }
        let key = MetricKey::new(metric, dimension)?;
        self.buffer.add(&key, value);
        Ok(())
    }

    /// Return distinct count estimate for `metric` and `dimension` over day buckets
    /// starting within `[start, end)`
    pub async fn query(
        &self,
        metric: &str,
        dimension: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, QueryError> {
        let key = MetricKey::new(metric, dimension)?;
        self.queries.estimate(&key, start, end).await
    }

    /// Run one flush cycle now; `None` if a cycle is already running
    pub async fn flush(&self) -> Option<FlushReport> {
        self.flusher.flush().await
    }

    /// Run one flush cycle bucketed at the day of `now`
    pub async fn flush_at(&self, now: DateTime<Utc>) -> Option<FlushReport> {
        self.flusher.flush_at(now).await
    }

    /// Spawn the periodic flush task using the configured interval
    pub fn start_scheduler(&self) -> FlushScheduler {
        FlushScheduler::start(self.flusher.clone(), self.config.flush_interval)
    }

    /// Return number of keys waiting for the next flush
    pub fn buffered_keys(&self) -> usize {
        self.buffer.len()
    }
}
