//! The sharded cache.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::hash::fnv32;
use crate::record::{Record, Sample};
use crate::shard::Shard;

/// Number of shards used by [`Cache::default`].
pub const DEFAULT_SHARD_COUNT: usize = 1024;

/// Concurrent buffer of time-series records, partitioned into shards.
///
/// All operations take `&self`; share the cache between threads with an
/// `Arc`.
pub struct Cache {
    shards: Box<[Shard]>,
    /// Buffered samples across all shards. Signed because a pop may subtract
    /// before the matching upsert has added.
    size: AtomicI64,
    overflow: AtomicU64,
    queries: AtomicU64,
    queue_builds: AtomicU64,
}

/// Point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Buffered samples (see [`Cache::size`]).
    pub size: usize,
    /// Records dropped by callers because the cache was full.
    pub overflow: u64,
    /// Read-only series lookups.
    pub queries: u64,
    /// Walks over all shards to enumerate buffered metrics.
    pub queue_builds: u64,
}

impl Cache {
    /// Create a cache with `shard_count` empty shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is zero.
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be positive");

        let shards: Vec<Shard> = (0..shard_count).map(|_| Shard::new()).collect();

        Self {
            shards: shards.into_boxed_slice(),
            size: AtomicI64::new(0),
            overflow: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            queue_builds: AtomicU64::new(0),
        }
    }

    /// Number of shards. Fixed for the life of the cache.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `metric`.
    #[inline]
    pub fn shard_index(&self, metric: &str) -> usize {
        fnv32(metric.as_bytes()) as usize % self.shards.len()
    }

    /// The shard that owns `metric`.
    #[inline]
    pub fn shard(&self, metric: &str) -> &Shard {
        &self.shards[self.shard_index(metric)]
    }

    /// Insert a record, or append its samples to the buffered series for the
    /// same metric.
    ///
    /// The size counter is updated after the shard lock is released, so a
    /// concurrent reader may briefly see a size that lags the shard contents.
    pub fn upsert(&self, record: Record) {
        let count = self.shard(record.metric()).upsert(record);
        self.size.fetch_add(count as i64, Ordering::Relaxed);
    }

    /// Remove and return the buffered series for `metric`.
    ///
    /// Returns `None` if nothing is buffered. A later upsert of the same
    /// metric starts a fresh record.
    pub fn pop(&self, metric: &str) -> Option<Record> {
        let record = self.shard(metric).pop(metric)?;
        self.size.fetch_sub(record.len() as i64, Ordering::Relaxed);
        Some(record)
    }

    /// Copy of the samples buffered for `metric`, without removing them.
    pub fn get(&self, metric: &str) -> Option<Vec<Sample>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.shard(metric).get(metric)
    }

    /// Names of all buffered series.
    ///
    /// Each shard is read-locked in turn, so the result is not a consistent
    /// snapshot across shards. Intended for building a write-out queue that is
    /// then drained with [`Cache::pop`].
    pub fn metrics(&self) -> Vec<String> {
        self.queue_builds.fetch_add(1, Ordering::Relaxed);

        let mut names = Vec::new();
        for shard in self.shards.iter() {
            shard.collect_metrics(&mut names);
        }
        names
    }

    /// Number of buffered samples across all shards.
    ///
    /// Eventually consistent: updated with a separate atomic step after each
    /// upsert or pop. Suitable for monitoring and capacity heuristics only.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed).max(0) as usize
    }

    /// Returns true if no samples are buffered (per [`Cache::size`]).
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Count a record the caller dropped instead of upserting.
    pub fn record_overflow(&self) {
        self.overflow.fetch_add(1, Ordering::Relaxed);
    }

    /// Records dropped by callers because the cache was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Number of [`Cache::get`] calls.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of [`Cache::metrics`] calls.
    pub fn queue_build_count(&self) -> u64 {
        self.queue_builds.load(Ordering::Relaxed)
    }

    /// Snapshot of the size and counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.size(),
            overflow: self.overflow_count(),
            queries: self.query_count(),
            queue_builds: self.queue_build_count(),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}
