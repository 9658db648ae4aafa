//! ## Ingestion buffer
//! Per-`(metric, dimension)` sketches accumulating values since the last flush.
//!
//! Sketches live in a `DashMap` so producers can insert-or-update concurrently, even
//! for the same key. The map itself sits behind a `RwLock`:
//! - `add` holds the read lock while it updates one shard
//! - `detach` takes the write lock and swaps in an empty map
//!
//! An `add` racing with `detach` therefore lands either in the detached map or in the
//! fresh one, never in both and never in neither.

use std::hash::BuildHasherDefault;

use dashmap::DashMap;
use parking_lot::RwLock;
use wyhash::WyHash;

use crate::error::SketchError;
use crate::record::MetricKey;
use crate::sketch::{hash_value, Sketch};

type BufferMap = DashMap<MetricKey, Sketch, BuildHasherDefault<WyHash>>;

/// Concurrent buffer of un-flushed sketches
pub struct IngestBuffer {
    /// Empty sketch cloned for every new key
    template: Sketch,
    live: RwLock<BufferMap>,
}

impl IngestBuffer {
    /// Create empty buffer whose sketches use `precision`
    pub fn new(precision: u8) -> Result<Self, SketchError> {
        Ok(Self {
            template: Sketch::new(precision)?,
            live: RwLock::new(BufferMap::default()),
        })
    }

    /// Return precision of buffered sketches
    #[inline]
    pub fn precision(&self) -> u8 {
        self.template.precision()
    }

    /// Add value to the sketch of `key`, creating the sketch on first use
    pub fn add<T: AsRef<[u8]> + ?Sized>(&self, key: &MetricKey, value: &T) {
        let hash = hash_value(value.as_ref());
        let live = self.live.read();
        if let Some(mut sketch) = live.get_mut(key) {
            sketch.add_hash(hash);
            return;
        }
        live.entry(key.clone())
            .or_insert_with(|| self.template.clone())
            .add_hash(hash);
    }

    /// Merge `sketch` into the live sketch of `key`
    pub fn restore(&self, key: MetricKey, sketch: &Sketch) -> Result<(), SketchError> {
        let live = self.live.read();
        let mut entry = live.entry(key).or_insert_with(|| self.template.clone());
        entry.merge(sketch)
    }

    /// Swap live map for an empty one and return everything buffered so far
    pub fn detach(&self) -> Vec<(MetricKey, Sketch)> {
        let detached = std::mem::take(&mut *self.live.write());
        detached.into_iter().collect()
    }

    /// Return number of buffered keys
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }
}

impl std::fmt::Debug for IngestBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestBuffer")
            .field("precision", &self.precision())
            .field("keys", &self.len())
            .finish()
    }
}
