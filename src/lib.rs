//! `cardinality-analytics` estimates distinct-visitor and distinct-event counts for
//! arbitrary `(metric, dimension)` pairs without storing raw identifiers.
//!
//! Values are folded into HyperLogLog sketches held in an in-memory buffer, flushed
//! periodically into one durable record per `(metric, dimension, day)` using optimistic
//! concurrency, and merged back together at query time over any range of days.
//!
//! ```ignore
//! let service = AnalyticsService::new(Arc::new(MemoryStore::new()), AnalyticsConfig::default())?;
//! let scheduler = service.start_scheduler();
//!
//! service.ingest("page_view", Some("US"), "user_42")?;
//! service.flush().await;
//!
//! let today = DayBucket::containing(Utc::now());
//! let visitors = service.query("page_view", Some("US"), today.start(), today.end()).await?;
//! scheduler.shutdown().await;
//! ```
pub mod buffer;
pub mod config;
pub mod error;
pub mod flush;
pub mod memory;
pub mod query;
pub mod record;
pub mod scheduler;
#[cfg(feature = "with_serde")]
mod serde;
pub mod service;
pub mod sketch;
pub mod store;

pub use config::AnalyticsConfig;
pub use error::{ConfigError, FlushError, InputError, QueryError, SketchError, StoreError};
pub use flush::{FlushReport, MergeOutcome};
pub use memory::MemoryStore;
pub use record::{DayBucket, MetricKey, RecordId, SketchRecord, DEFAULT_DIMENSION};
pub use scheduler::FlushScheduler;
pub use service::AnalyticsService;
pub use sketch::{Sketch, DEFAULT_PRECISION};
pub use store::{InsertOutcome, SketchStore};
