//! Sharded in-memory buffer for incoming time-series points.
//!
//! Points arrive at a high rate from many concurrent connections and are
//! accumulated here, keyed by metric name, until a flush process drains each
//! series with [`Cache::pop`] and writes it to durable storage.
//!
//! # Design
//!
//! - The key space is split across a fixed number of [`Shard`]s, each guarded
//!   by its own read-write lock, so writers for different metrics only contend
//!   when their names hash to the same shard.
//! - Routing is a 32-bit FNV-style hash of the metric name modulo the shard
//!   count. The shard count is fixed when the cache is built, so a metric maps
//!   to the same shard for the life of the cache.
//! - [`Cache::upsert`] appends to an existing series (arrival order, no
//!   sorting or deduplication) or inserts a new one.
//! - [`Cache::pop`] detaches an entire series atomically with respect to
//!   concurrent upserts of the same metric.
//! - A process-wide sample count is maintained with atomics outside the shard
//!   locks. It is eventually consistent; see [`Cache::size`].
//!
//! # Example
//!
//! ```
//! use points_cache::{Cache, Record, Sample};
//!
//! let cache = Cache::new(16);
//! cache.upsert(Record::single("cpu.load", Sample::new(0.5, 1000)));
//! cache.upsert(Record::single("cpu.load", Sample::new(0.7, 1010)));
//! assert_eq!(cache.size(), 2);
//!
//! let record = cache.pop("cpu.load").unwrap();
//! assert_eq!(record.samples().len(), 2);
//! assert!(cache.pop("cpu.load").is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod hash;
mod record;
mod shard;

pub use cache::{Cache, CacheStats, DEFAULT_SHARD_COUNT};
pub use hash::fnv32;
pub use record::{Record, Sample};
pub use shard::Shard;
