//! Per-connection line handling.
//!
//! A connection handler frames the byte stream on `\n`, parses each complete
//! line into a [`Record`] and forwards it to the cache writer through a
//! bounded queue. Sending blocks when the queue is full, which is how a slow
//! writer throttles ingestion.

use points_cache::{Record, Sample};
use protocol_plaintext::Line;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use crate::metrics::{LINES_RECEIVED, PARSE_ERRORS, RECORDS_FORWARDED};

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Time allowed to receive each complete line. Restarts after every line,
    /// so a steady sender is never cut off, but a client that goes quiet (or
    /// stalls mid-line) is disconnected.
    pub idle_timeout: Duration,
    /// Longest accepted line in bytes, including the newline.
    pub max_line_length: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            max_line_length: 64 * 1024,
        }
    }
}

/// Reason for closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client closed the connection on a line boundary
    ClientEof,
    /// Client closed the connection with a partial line buffered
    UnfinishedLine,
    /// No complete line arrived within the idle timeout
    IdleTimeout,
    /// A line exceeded the maximum length
    LineTooLong,
    /// Error during read
    ReadError,
    /// The cache writer is gone
    QueueClosed,
}

/// Read lines from `stream` until it ends, forwarding parsed records to `out`.
///
/// The stream is owned and dropped on return, whichever way the connection
/// ends.
pub async fn handle_connection<S>(
    stream: S,
    peer: SocketAddr,
    out: mpsc::Sender<Record>,
    options: ConnectionOptions,
) -> CloseReason
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(256);
    let limit = options.max_line_length as u64;

    loop {
        line.clear();

        let read = async { (&mut reader).take(limit).read_until(b'\n', &mut line).await };
        let n = match tokio::time::timeout(options.idle_timeout, read).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                if is_connection_reset(&e) {
                    tracing::debug!(%peer, error = %e, "connection reset");
                } else {
                    tracing::error!(%peer, error = %e, "read error");
                }
                return CloseReason::ReadError;
            }
            Err(_) => {
                tracing::info!(%peer, timeout = ?options.idle_timeout, "connection idle timeout");
                return CloseReason::IdleTimeout;
            }
        };

        if n == 0 {
            return CloseReason::ClientEof;
        }

        if line.last() != Some(&b'\n') {
            if n as u64 >= limit && !at_eof(&mut reader, options.idle_timeout).await {
                tracing::warn!(%peer, limit = options.max_line_length, "line too long, closing connection");
                return CloseReason::LineTooLong;
            }
            tracing::warn!(%peer, line = ?String::from_utf8_lossy(&line), "unfinished line");
            return CloseReason::UnfinishedLine;
        }

        LINES_RECEIVED.increment();

        let Some(record) = parse_record(&line, peer) else {
            continue;
        };

        if out.send(record).await.is_err() {
            tracing::warn!(%peer, "record queue closed, dropping connection");
            return CloseReason::QueueClosed;
        }
        RECORDS_FORWARDED.increment();
    }
}

/// Returns true if the stream has ended with nothing left to read.
///
/// A full-length line cut off by EOF is unfinished rather than too long.
async fn at_eof<R>(reader: &mut R, wait: Duration) -> bool
where
    R: AsyncBufRead + Unpin,
{
    matches!(
        tokio::time::timeout(wait, reader.fill_buf()).await,
        Ok(Ok(buf)) if buf.is_empty()
    )
}

/// Parse one terminated line. Blank lines and malformed lines yield `None`.
fn parse_record(line: &[u8], peer: SocketAddr) -> Option<Record> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    match Line::parse(line) {
        Ok(parsed) => Some(Record::single(
            parsed.metric,
            Sample::new(parsed.value, parsed.timestamp),
        )),
        Err(e) => {
            PARSE_ERRORS.increment();
            tracing::info!(
                %peer,
                error = %e,
                line = ?String::from_utf8_lossy(line.trim_ascii_end()),
                "dropping malformed line"
            );
            None
        }
    }
}

fn is_connection_reset(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}
