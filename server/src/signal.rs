//! Signal handling for graceful shutdown.
//!
//! SIGINT and SIGTERM set a shared flag that the daemon polls. A second
//! signal exits immediately without draining open connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install signal handlers for graceful shutdown.
///
/// Returns a flag that becomes `true` when the first signal arrives.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("received second signal, exiting without draining");
            std::process::exit(1);
        }
        tracing::info!("received shutdown signal, draining connections");
    })?;

    Ok(shutdown)
}
