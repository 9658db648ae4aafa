//! Error types for sketch, store, ingest, query and configuration operations.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by `Sketch` construction, merging and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// Precision outside of the supported `[4..16]` range
    #[error("invalid precision {0}: must be within [4..16]")]
    InvalidPrecision(u8),

    /// Two sketches (or a sketch and a stored record) disagree on precision
    #[error("precision mismatch: expected {expected}, got {actual}")]
    PrecisionMismatch { expected: u8, actual: u8 },

    /// Register blob length does not equal `2^precision`
    #[error("invalid blob length for precision {precision}: expected {expected} bytes, got {actual}")]
    InvalidBlobLength {
        precision: u8,
        expected: usize,
        actual: usize,
    },
}

/// Errors surfaced by a `SketchStore` collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store rejected or failed the operation
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Malformed input rejected by `ingest` and `query`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("metric must not be empty")]
    EmptyMetric,

    #[error("value must not be empty")]
    EmptyValue,

    /// Metric or dimension contains the record id separator
    #[error("invalid key component {0:?}: must not contain ':'")]
    InvalidKey(String),
}

/// Errors returned by range queries.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Sketch(#[from] SketchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors aborting the merge of one buffered key during a flush cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    #[error(transparent)]
    Sketch(#[from] SketchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidPrecision(#[from] SketchError),

    #[error("flush interval must be greater than zero")]
    ZeroFlushInterval,

    #[error("max flush attempts must be greater than zero")]
    ZeroAttempts,
}
