//! Startup banner utilities.

use crate::config::{Config, format_size};
use std::fmt::Write;

/// Render the startup banner.
pub fn banner(version: &str, config: &Config) -> String {
    let mut output = String::with_capacity(512);

    let name = "metricsd";
    let _ = writeln!(output, "{} v{}", name, version);
    let _ = writeln!(output, "{}", "=".repeat(name.len() + version.len() + 2));
    let _ = writeln!(output);

    let _ = writeln!(output, "Workers:     {}", config.threads());
    let _ = writeln!(output);

    let _ = writeln!(output, "Listeners:");
    let _ = writeln!(output, "  Plaintext: {}", config.receiver.address);
    if config.metrics.enabled {
        let _ = writeln!(output, "  Admin:     {}", config.metrics.address);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "Receiver:");
    let _ = writeln!(
        output,
        "  Idle timeout: {:?}",
        config.receiver.idle_timeout
    );
    let _ = writeln!(
        output,
        "  Max line:     {}",
        format_size(config.receiver.max_line_length)
    );
    let _ = writeln!(output, "  Queue:        {}", config.receiver.queue_capacity);
    let _ = writeln!(output);

    let _ = writeln!(output, "Cache:");
    let _ = writeln!(output, "  Shards:   {}", config.cache.shards);
    if config.cache.max_size > 0 {
        let _ = writeln!(output, "  Max size: {} samples", config.cache.max_size);
    } else {
        let _ = writeln!(output, "  Max size: unbounded");
    }

    output
}

/// Print the startup banner to stdout.
pub fn print_banner(version: &str, config: &Config) {
    print!("{}", banner(version, config));
}
