//! Daemon configuration.
//!
//! Loaded from a TOML file. Every section is optional and falls back to the
//! defaults printed by `metricsd --print-config`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::ConnectionOptions;

/// Errors returned while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration loaded from TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Worker thread configuration
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Point cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// TCP receiver configuration
    #[serde(default)]
    pub receiver: ReceiverConfig,

    /// Graceful shutdown configuration
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Admin/metrics endpoint configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Worker thread configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkersConfig {
    /// Number of runtime worker threads (default: number of CPUs)
    pub threads: Option<usize>,
}

/// Point cache configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Number of independently locked shards. Fixed for the process lifetime.
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Buffered samples at which incoming records are dropped (0 = unbounded)
    #[serde(default)]
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            max_size: 0,
        }
    }
}

/// TCP receiver configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverConfig {
    /// Address to listen on
    #[serde(default = "default_receiver_address")]
    pub address: SocketAddr,

    /// Time allowed to receive each complete line (e.g., "60s", "500ms")
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub idle_timeout: Duration,

    /// Longest accepted line, including its newline (e.g., "64KB")
    #[serde(
        default = "default_max_line_length",
        deserialize_with = "deserialize_size"
    )]
    pub max_line_length: usize,

    /// Parsed records buffered between connections and the cache writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            address: default_receiver_address(),
            idle_timeout: default_idle_timeout(),
            max_line_length: default_max_line_length(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ReceiverConfig {
    /// Per-connection options derived from this section.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            idle_timeout: self.idle_timeout,
            max_line_length: self.max_line_length,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownConfig {
    /// How long to wait for open connections to finish after the listener
    /// closes (e.g., "30s")
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "server=debug,info"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include the module target
    #[serde(default = "default_true")]
    pub target: bool,

    /// Include thread names
    #[serde(default)]
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            target: true,
            thread_names: false,
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve /health, /ready and /metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address for the admin endpoint
    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}

// Default value functions

fn default_shards() -> usize {
    points_cache::DEFAULT_SHARD_COUNT
}

fn default_receiver_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 2003))
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_line_length() -> usize {
    64 * 1024
}

fn default_queue_capacity() -> usize {
    65536
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_true() -> bool {
    true
}

/// Deserialize a size string like "64KB" or a plain byte count.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(usize),
        String(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(D::Error::custom),
    }
}

/// Deserialize a duration string like "60s" or a plain number of seconds.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationValue {
        Seconds(u64),
        String(String),
    }

    match DurationValue::deserialize(deserializer)? {
        DurationValue::Seconds(n) => Ok(Duration::from_secs(n)),
        DurationValue::String(s) => parse_duration(&s).map_err(D::Error::custom),
    }
}

/// Split "64KB" into (64, "KB").
fn split_number(s: &str) -> Result<(u64, String), String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty value".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| c.is_alphabetic()) {
        Some(idx) => (&s[..idx], s[idx..].to_lowercase()),
        None => (s, String::new()),
    };

    let num = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    Ok((num, suffix))
}

/// Parse a size string like "512B", "64KB", "1MB" into bytes.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let (num, suffix) = split_number(s)?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        _ => return Err(format!("unknown size suffix: {}", suffix)),
    };

    num.checked_mul(multiplier)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| "size overflow".to_string())
}

/// Parse a duration string like "500ms", "60s", "5m", "1h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let (num, suffix) = split_number(s)?;

    let duration = match suffix.as_str() {
        "ms" => Duration::from_millis(num),
        "" | "s" | "sec" | "secs" => Duration::from_secs(num),
        "m" | "min" | "mins" => Duration::from_secs(num.saturating_mul(60)),
        "h" => Duration::from_secs(num.saturating_mul(3600)),
        _ => return Err(format!("unknown duration suffix: {}", suffix)),
    };

    Ok(duration)
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.shards == 0 {
            return Err(ConfigError::Invalid("cache.shards must be positive".into()));
        }

        if self.receiver.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "receiver.idle_timeout must be positive".into(),
            ));
        }

        if self.receiver.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "receiver.max_line_length must be positive".into(),
            ));
        }

        if self.receiver.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "receiver.queue_capacity must be positive".into(),
            ));
        }

        if self.workers.threads == Some(0) {
            return Err(ConfigError::Invalid("workers.threads must be positive".into()));
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level is not a valid filter: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Get the number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.threads.unwrap_or_else(num_cpus::get)
    }
}

/// Format a size in bytes as a human-readable string.
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB && bytes.is_multiple_of(MB) {
        format!("{} MB", bytes / MB)
    } else if bytes >= KB && bytes.is_multiple_of(KB) {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.shards, 1024);
        assert_eq!(config.cache.max_size, 0);
        assert_eq!(config.receiver.address, "0.0.0.0:2003".parse().unwrap());
        assert_eq!(config.receiver.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.receiver.max_line_length, 64 * 1024);
        assert_eq!(config.receiver.queue_capacity, 65536);
        assert_eq!(config.shutdown.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [workers]
            threads = 2

            [cache]
            shards = 16
            max_size = 1000000

            [receiver]
            address = "127.0.0.1:12003"
            idle_timeout = "500ms"
            max_line_length = "4KB"
            queue_capacity = 128

            [shutdown]
            drain_timeout = 5

            [logging]
            level = "debug"
            format = "json"
            timestamps = false

            [metrics]
            enabled = false
            address = "127.0.0.1:19090"
            "#,
        )
        .unwrap();

        assert_eq!(config.threads(), 2);
        assert_eq!(config.cache.shards, 16);
        assert_eq!(config.cache.max_size, 1_000_000);
        assert_eq!(config.receiver.idle_timeout, Duration::from_millis(500));
        assert_eq!(config.receiver.max_line_length, 4096);
        assert_eq!(config.shutdown.drain_timeout, Duration::from_secs(5));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.timestamps);
        assert!(!config.metrics.enabled);

        let options = config.receiver.connection_options();
        assert_eq!(options.idle_timeout, Duration::from_millis(500));
        assert_eq!(options.max_line_length, 4096);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = toml::from_str("[cache]\nheap_size = \"4GB\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config: Config = toml::from_str("[cache]\nshards = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: Config = toml::from_str("[receiver]\nqueue_capacity = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[receiver]\nidle_timeout = \"0s\"\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[workers]\nthreads = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let config: Config = toml::from_str("[logging]\nlevel = \"server=loud\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("512B"), Ok(512));
        assert_eq!(parse_size("64KB"), Ok(64 * 1024));
        assert_eq!(parse_size("1mb"), Ok(1024 * 1024));
        assert!(parse_size("").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("60s"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("60"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/metricsd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(64 * 1024), "64 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_size(1000), "1000 bytes");
    }
}
