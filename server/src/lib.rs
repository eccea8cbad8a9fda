//! Metrics ingestion daemon.
//!
//! Accepts plaintext `metric value timestamp` lines over TCP and buffers the
//! points in a sharded [`points_cache::Cache`] until a flush process drains
//! them.
//!
//! ```text
//! client -> TcpReceiver -> connection task -> bounded queue -> CacheWriter -> Cache
//! ```

pub mod admin;
pub mod banner;
pub mod config;
pub mod connection;
pub mod daemon;
pub mod logging;
pub mod metrics;
pub mod receiver;
pub mod signal;
pub mod writer;

pub use config::Config;
pub use receiver::{ReceiverError, State, TcpReceiver};
pub use writer::{CacheWriter, WriterStats};
