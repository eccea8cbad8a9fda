//! Metrics ingestion daemon binary.

use clap::Parser;
use points_cache::Cache;
use server::admin::{self, AdminConfig};
use server::banner::print_banner;
use server::config::Config;
use server::{daemon, logging, signal};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "metricsd")]
#[command(about = "Plaintext metrics ingestion daemon")]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            eprintln!("No config file specified. Pass a config path or use --print-config");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        tracing::error!(error = %e, "daemon error");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    print_banner(env!("CARGO_PKG_VERSION"), &config);

    let shutdown = signal::install_signal_handler()?;

    let cache = Arc::new(Cache::new(config.cache.shards));

    let admin_handle = if config.metrics.enabled {
        Some(admin::start(AdminConfig {
            address: config.metrics.address,
            shutdown: shutdown.clone(),
            cache: cache.clone(),
        })?)
    } else {
        None
    };

    let result = daemon::run(&config, cache, shutdown);

    if let Some(handle) = admin_handle {
        handle.shutdown();
    }

    result.map(|_| ())
}

fn print_default_config() {
    let config = r#"# metricsd configuration

[workers]
# Number of runtime worker threads (default: number of CPUs)
# threads = 8

[cache]
# Number of independently locked shards. Fixed for the process lifetime.
shards = 1024

# Buffered samples at which incoming records are dropped and counted as
# overflow. 0 disables the limit.
max_size = 0

[receiver]
# Plaintext protocol listener: one "metric value timestamp" per line
address = "0.0.0.0:2003"

# Time allowed to receive each complete line. Restarts after every line.
idle_timeout = "60s"

# Longest accepted line, including the newline. Longer lines close the
# connection.
max_line_length = "64KB"

# Parsed records buffered between connections and the cache writer. When
# full, connections stop reading until the writer catches up.
queue_capacity = 65536

[shutdown]
# How long open connections may keep sending after the listener closes
drain_timeout = "30s"

[logging]
# Filter directive: "error", "warn", "info", "debug", "trace", or per-target
# Can be overridden with RUST_LOG environment variable
level = "info"
# Log format: "pretty", "compact", or "json"
format = "pretty"
# Include timestamps
timestamps = true
# Include module target
target = true
# Include thread names
thread_names = false

[metrics]
# Admin server with health checks (/health, /ready) and Prometheus metrics (/metrics)
enabled = true
address = "127.0.0.1:9090"
"#;
    print!("{}", config);
}
