//! Ingestion metrics.

use metriken::{Counter, Gauge, metric};

use crate::connection::CloseReason;

// Connection metrics
#[metric(
    name = "connections_accepted",
    description = "Total number of connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Number of currently open connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(
    name = "accept_errors",
    description = "Accept calls that failed for reasons other than shutdown"
)]
pub static ACCEPT_ERRORS: Counter = Counter::new();

// Close reasons
#[metric(
    name = "connections_closed_eof",
    description = "Connections closed by the client on a line boundary"
)]
pub static CLOSED_EOF: Counter = Counter::new();

#[metric(
    name = "connections_closed_unfinished_line",
    description = "Connections closed by the client mid-line"
)]
pub static CLOSED_UNFINISHED_LINE: Counter = Counter::new();

#[metric(
    name = "connections_closed_idle_timeout",
    description = "Connections closed for not completing a line in time"
)]
pub static CLOSED_IDLE_TIMEOUT: Counter = Counter::new();

#[metric(
    name = "connections_closed_line_too_long",
    description = "Connections closed for sending an over-long line"
)]
pub static CLOSED_LINE_TOO_LONG: Counter = Counter::new();

#[metric(
    name = "connections_closed_read_error",
    description = "Connections closed after a read error"
)]
pub static CLOSED_READ_ERROR: Counter = Counter::new();

#[metric(
    name = "connections_closed_queue_closed",
    description = "Connections closed because the cache writer stopped"
)]
pub static CLOSED_QUEUE_CLOSED: Counter = Counter::new();

// Line processing
#[metric(name = "lines_received", description = "Complete lines received")]
pub static LINES_RECEIVED: Counter = Counter::new();

#[metric(name = "parse_errors", description = "Lines dropped as malformed")]
pub static PARSE_ERRORS: Counter = Counter::new();

#[metric(
    name = "records_forwarded",
    description = "Records handed to the cache writer queue"
)]
pub static RECORDS_FORWARDED: Counter = Counter::new();

// Cache writer
#[metric(name = "records_written", description = "Records upserted into the cache")]
pub static RECORDS_WRITTEN: Counter = Counter::new();

#[metric(
    name = "records_dropped",
    description = "Records dropped because the cache was full"
)]
pub static RECORDS_DROPPED: Counter = Counter::new();

#[metric(
    name = "cache_size",
    description = "Samples buffered in the cache, sampled on each scrape"
)]
pub static CACHE_SIZE: Gauge = Gauge::new();

/// Count a closed connection by reason.
pub fn record_close(reason: CloseReason) {
    let counter = match reason {
        CloseReason::ClientEof => &CLOSED_EOF,
        CloseReason::UnfinishedLine => &CLOSED_UNFINISHED_LINE,
        CloseReason::IdleTimeout => &CLOSED_IDLE_TIMEOUT,
        CloseReason::LineTooLong => &CLOSED_LINE_TOO_LONG,
        CloseReason::ReadError => &CLOSED_READ_ERROR,
        CloseReason::QueueClosed => &CLOSED_QUEUE_CLOSED,
    };
    counter.increment();
}
