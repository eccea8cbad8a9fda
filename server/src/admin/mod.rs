//! HTTP admin server for health checks and metrics exposition.
//!
//! Provides the following endpoints:
//! - `GET /health` - Liveness probe (always returns 200 OK)
//! - `GET /ready` - Readiness probe (503 once shutdown has started)
//! - `GET /metrics` - Prometheus-formatted metrics

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use points_cache::Cache;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::metrics::CACHE_SIZE;

/// Handle returned by [`start`] for shutdown coordination.
pub struct AdminHandle {
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    join_handle: std::thread::JoinHandle<()>,
}

impl AdminHandle {
    /// Signal the admin server to shut down and wait for it to finish.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.join();
    }
}

/// Configuration for the admin server.
pub struct AdminConfig {
    /// Address to bind the admin server to.
    pub address: SocketAddr,
    /// Shared shutdown flag, reported by the readiness probe.
    pub shutdown: Arc<AtomicBool>,
    /// Cache whose size is reported on each scrape.
    pub cache: Arc<Cache>,
}

/// Start the admin server on a dedicated thread.
///
/// The admin server gets its own current-thread runtime so a saturated
/// ingestion runtime cannot starve health checks.
pub fn start(config: AdminConfig) -> std::io::Result<AdminHandle> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let join_handle = std::thread::Builder::new()
        .name("admin".to_string())
        .spawn(move || {
            runtime.block_on(run_admin_server(
                config.address,
                config.shutdown,
                config.cache,
                shutdown_rx,
            ));
        })?;

    Ok(AdminHandle {
        shutdown_tx,
        join_handle,
    })
}

async fn run_admin_server(
    address: SocketAddr,
    shutdown: Arc<AtomicBool>,
    cache: Arc<Cache>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/ready",
            get(move || ready_handler(shutdown.clone())),
        )
        .route("/metrics", get(move || metrics_handler(cache.clone())));

    let listener = match tokio::net::TcpListener::bind(address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, address = %address, "failed to bind admin server");
            return;
        }
    };

    tracing::info!(address = %address, "admin server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "admin server error");
    }

    tracing::debug!("admin server stopped");
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ready_handler(shutdown: Arc<AtomicBool>) -> impl IntoResponse {
    if shutdown.load(Ordering::Relaxed) {
        (StatusCode::SERVICE_UNAVAILABLE, "Shutting down")
    } else {
        (StatusCode::OK, "OK")
    }
}

async fn metrics_handler(cache: Arc<Cache>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        render_metrics(&cache),
    )
}

/// Refresh gauges derived from `cache` and render all metrics.
///
/// The cache is drained outside the ingest path, so its size is sampled at
/// scrape time.
pub fn render_metrics(cache: &Cache) -> String {
    CACHE_SIZE.set(cache.size() as i64);
    prometheus_output()
}

/// Render every registered metric in Prometheus text format.
pub fn prometheus_output() -> String {
    let mut output = String::with_capacity(4096);

    for metric in metriken::metrics().iter() {
        let name = metric.name();
        if name.is_empty() {
            continue;
        }

        let (kind, value) = match metric.value() {
            Some(metriken::Value::Counter(v)) => ("counter", v.to_string()),
            Some(metriken::Value::Gauge(v)) => ("gauge", v.to_string()),
            _ => continue,
        };

        let name = prometheus_name(name);
        let _ = writeln!(output, "# TYPE {} {}", name, kind);
        let _ = writeln!(output, "{} {}", name, value);
    }

    output
}

/// Replace characters Prometheus does not allow in metric names.
fn prometheus_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
