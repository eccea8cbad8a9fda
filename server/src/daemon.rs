//! Wiring of receiver, queue, cache writer and shutdown.

use points_cache::{Cache, CacheStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::receiver::TcpReceiver;
use crate::writer::CacheWriter;

/// How often the shutdown flag is checked.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Build a runtime and serve until `shutdown` is set.
pub fn run(
    config: &Config,
    cache: Arc<Cache>,
    shutdown: Arc<AtomicBool>,
) -> Result<CacheStats, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads())
        .thread_name("metricsd-worker")
        .enable_all()
        .build()?;

    runtime.block_on(serve(config, cache, shutdown))
}

/// Accept and ingest points until `shutdown` is set, then drain.
///
/// On shutdown the listener is closed first. Open connections may keep
/// sending for up to `shutdown.drain_timeout`; after that the writer is
/// abandoned and whatever it already wrote stays in the cache.
pub async fn serve(
    config: &Config,
    cache: Arc<Cache>,
    shutdown: Arc<AtomicBool>,
) -> Result<CacheStats, Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel(config.receiver.queue_capacity);
    let mut writer = tokio::spawn(CacheWriter::new(cache.clone(), config.cache.max_size).run(rx));

    let mut receiver = TcpReceiver::new(tx, config.receiver.connection_options());
    receiver.listen(config.receiver.address).await?;

    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }

    receiver.stop();
    receiver.join().await;
    // Releases the receiver's queue sender; open connections hold their own.
    drop(receiver);

    let drain_timeout = config.shutdown.drain_timeout;
    match tokio::time::timeout(drain_timeout, &mut writer).await {
        Ok(Ok(stats)) => {
            tracing::info!(
                written = stats.written,
                dropped = stats.dropped,
                "drained open connections"
            );
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "cache writer failed");
        }
        Err(_) => {
            tracing::warn!(timeout = ?drain_timeout, "drain timeout expired with connections still open");
            writer.abort();
        }
    }

    let stats = cache.stats();
    tracing::info!(
        size = stats.size,
        overflow = stats.overflow,
        "ingestion stopped"
    );
    Ok(stats)
}
