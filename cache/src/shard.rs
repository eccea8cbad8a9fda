//! A single independently-locked partition of the cache.
//!
//! Uses RwLock so inspection (`len`, `get`, metric enumeration) can proceed
//! concurrently; upsert and pop always take the write lock.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::record::{Record, Sample};

/// One partition of the cache, owning the series whose names route to it.
pub struct Shard {
    /// Metric name -> buffered samples in arrival order.
    pub(crate) entries: RwLock<HashMap<String, Vec<Sample>>>,
}

impl Shard {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Append the record's samples to the existing series, or insert it.
    ///
    /// Returns the number of samples added.
    pub(crate) fn upsert(&self, record: Record) -> usize {
        let (metric, samples) = record.into_parts();
        let count = samples.len();

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get_mut(metric.as_str()) {
            existing.extend(samples);
        } else {
            entries.insert(metric, samples);
        }

        count
    }

    /// Detach the series for `metric`, if present.
    pub(crate) fn pop(&self, metric: &str) -> Option<Record> {
        let removed = self.entries.write().remove_entry(metric);
        removed.map(|(metric, samples)| Record::new(metric, samples))
    }

    /// Copy of the buffered samples for `metric`.
    pub(crate) fn get(&self, metric: &str) -> Option<Vec<Sample>> {
        self.entries.read().get(metric).cloned()
    }

    /// Append the names of all buffered series to `out`.
    pub(crate) fn collect_metrics(&self, out: &mut Vec<String>) {
        let entries = self.entries.read();
        out.extend(entries.keys().cloned());
    }

    /// Number of series buffered in this shard.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no series are buffered in this shard.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns true if a series for `metric` is buffered in this shard.
    pub fn contains(&self, metric: &str) -> bool {
        self.entries.read().contains_key(metric)
    }
}
