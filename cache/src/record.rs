//! Time-series value types.

/// A single measurement: a value observed at a timestamp (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Measured value.
    pub value: f64,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl Sample {
    /// Create a sample.
    #[inline]
    pub const fn new(value: f64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// A metric name and its samples in arrival order.
///
/// Records are produced by the line parser with a single sample and grow
/// inside the cache as further samples for the same metric arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    metric: String,
    samples: Vec<Sample>,
}

impl Record {
    /// Create a record from a metric name and samples.
    ///
    /// The metric name must not be empty.
    pub fn new(metric: impl Into<String>, samples: Vec<Sample>) -> Self {
        let metric = metric.into();
        debug_assert!(!metric.is_empty(), "metric name must not be empty");
        Self { metric, samples }
    }

    /// Create a record holding one sample.
    pub fn single(metric: impl Into<String>, sample: Sample) -> Self {
        Self::new(metric, vec![sample])
    }

    /// The metric name.
    #[inline]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// The samples, oldest arrival first.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the record holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split the record into its metric name and samples.
    pub fn into_parts(self) -> (String, Vec<Sample>) {
        (self.metric, self.samples)
    }
}
