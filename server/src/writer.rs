//! Consumer side of the record queue.
//!
//! The cache never rejects an upsert on its own. The writer applies the
//! capacity policy: when the cache holds `max_size` samples or more, incoming
//! records are dropped and counted as overflow instead of blocking or growing
//! without bound.

use points_cache::{Cache, Record};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::metrics::{RECORDS_DROPPED, RECORDS_WRITTEN};

/// Records processed by a [`CacheWriter`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub dropped: u64,
}

/// Drains parsed records into the cache.
pub struct CacheWriter {
    cache: Arc<Cache>,
    max_size: usize,
}

impl CacheWriter {
    /// Create a writer. A `max_size` of 0 disables the overflow check.
    pub fn new(cache: Arc<Cache>, max_size: usize) -> Self {
        Self { cache, max_size }
    }

    /// Upsert one record, or drop it if the cache is full.
    ///
    /// Returns true if the record was written.
    pub fn write(&self, record: Record) -> bool {
        if self.max_size > 0 && self.cache.size() >= self.max_size {
            self.cache.record_overflow();
            RECORDS_DROPPED.increment();
            tracing::trace!(metric = record.metric(), "cache full, dropping record");
            return false;
        }

        self.cache.upsert(record);
        RECORDS_WRITTEN.increment();
        true
    }

    /// Consume records until every sender has been dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<Record>) -> WriterStats {
        let mut stats = WriterStats::default();

        while let Some(record) = rx.recv().await {
            if self.write(record) {
                stats.written += 1;
            } else {
                stats.dropped += 1;
            }
        }

        tracing::debug!(
            written = stats.written,
            dropped = stats.dropped,
            "cache writer finished"
        );
        stats
    }
}
