//! Plaintext line protocol for time-series points.
//!
//! Each line carries one point as three whitespace-separated fields:
//!
//! ```text
//! <metric> <value> <timestamp>\n
//! ```
//!
//! The value is a float; the timestamp is seconds since the Unix epoch and
//! may be written as a float, in which case it is truncated.
//!
//! Framing (splitting a byte stream on `\n`) is the caller's job. The parser
//! accepts a single line with or without its terminator and borrows the
//! metric name from the input.
//!
//! # Example
//!
//! ```
//! use protocol_plaintext::Line;
//!
//! let line = Line::parse(b"servers.a.cpu 0.75 1700000000\n").unwrap();
//! assert_eq!(line.metric, "servers.a.cpu");
//! assert_eq!(line.value, 0.75);
//! assert_eq!(line.timestamp, 1700000000);
//!
//! let mut buf = Vec::new();
//! line.encode(&mut buf);
//! assert_eq!(buf, b"servers.a.cpu 0.75 1700000000\n");
//! ```

use std::fmt;

/// Parse error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line is not valid UTF-8.
    #[error("line is not valid utf-8")]
    NotUtf8,
    /// The line does not have exactly three fields.
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    /// The value field is not a number.
    #[error("invalid value: {0:?}")]
    InvalidValue(String),
    /// The timestamp field is not a finite number.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// One parsed point, borrowing the metric name from the input line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line<'a> {
    /// Metric name. Never empty.
    pub metric: &'a str,
    /// Measured value. Never NaN.
    pub value: f64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl<'a> Line<'a> {
    /// Parse a line from raw bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(data).map_err(|_| ParseError::NotUtf8)?;
        Self::parse_str(text)
    }

    /// Parse a line from a string.
    pub fn parse_str(text: &'a str) -> Result<Self, ParseError> {
        let mut fields = text.split_ascii_whitespace();

        let (Some(metric), Some(value), Some(timestamp), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ParseError::FieldCount(
                text.split_ascii_whitespace().count(),
            ));
        };

        let value = match value.parse::<f64>() {
            Ok(v) if !v.is_nan() => v,
            _ => return Err(ParseError::InvalidValue(value.to_string())),
        };

        let timestamp = match timestamp.parse::<f64>() {
            Ok(t) if t.is_finite() => t as i64,
            _ => return Err(ParseError::InvalidTimestamp(timestamp.to_string())),
        };

        Ok(Self {
            metric,
            value,
            timestamp,
        })
    }

    /// Append the encoded line, including its terminator, to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.to_string().as_bytes());
        buf.push(b'\n');
    }
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.value, self.timestamp)
    }
}
