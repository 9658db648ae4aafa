//! Service configuration.
//!
//! Precision is a process-wide invariant: every buffered sketch and every persisted
//! record handled by one service must share it, otherwise merges fail with
//! `SketchError::PrecisionMismatch`.

use std::time::Duration;

use crate::error::ConfigError;
use crate::sketch::{register_count, DEFAULT_PRECISION};

/// Default interval between flush cycles
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of read-merge-write attempts per key and flush cycle
pub const DEFAULT_MAX_FLUSH_ATTEMPTS: u32 = 3;

/// Configuration of `AnalyticsService`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "with_serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AnalyticsConfig {
    /// Sketch precision used for buffering, persistence and queries
    pub precision: u8,
    /// Interval between scheduled flush cycles
    pub flush_interval: Duration,
    /// Read-merge-write attempts per key before the key is abandoned for the cycle
    pub max_flush_attempts: u32,
    /// Optional deadline applied to each query
    pub query_timeout: Option<Duration>,
    /// Merge entries that exhausted their attempts back into the live buffer
    /// instead of dropping them. Off by default: contention is allowed to lose
    /// that cycle's contribution.
    pub rebuffer_on_exhaustion: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_flush_attempts: DEFAULT_MAX_FLUSH_ATTEMPTS,
            query_timeout: None,
            rebuffer_on_exhaustion: false,
        }
    }
}

impl AnalyticsConfig {
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_max_flush_attempts(mut self, attempts: u32) -> Self {
        self.max_flush_attempts = attempts;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_rebuffer_on_exhaustion(mut self, enabled: bool) -> Self {
        self.rebuffer_on_exhaustion = enabled;
        self
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        register_count(self.precision)?;
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroFlushInterval);
        }
        if self.max_flush_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}
