use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default histogram bucket upper bounds, in milliseconds.
///
/// The last bucket doubles as the overflow bucket: anything slower than
/// 5 seconds is counted there.
pub const DEFAULT_BUCKETS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 2000, 5000];

/// Fixed-bucket histogram for approximate latency percentiles.
///
/// Keeps one counter per bucket plus running sum, min and max; no raw
/// samples are stored, so memory is constant regardless of traffic.
///
/// # Accuracy
///
/// Percentiles are reported at bucket granularity: the result is the upper
/// bound of the bucket in which the requested rank falls, with no
/// interpolation. `percentile(0)` and `percentile(100)` are exact (the
/// observed min and max).
///
/// # Example
///
/// ```
/// use insightio_metrics::LatencyHistogram;
/// use std::time::Duration;
///
/// let mut hist = LatencyHistogram::new();
/// hist.observe(Duration::from_millis(3));
/// hist.observe(Duration::from_millis(40));
///
/// assert_eq!(hist.total(), 2);
/// assert_eq!(hist.average(), 21.5);
/// assert_eq!(hist.percentile(50.0), 5.0);
/// assert_eq!(hist.max(), 40.0);
/// ```
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    /// Strictly increasing upper bounds, shared by every histogram of a store
    buckets: Arc<[u64]>,
    /// Count of samples in each bucket, aligned with `buckets`
    counts: Vec<u64>,
    total: u64,
    sum_ms: u64,
    min_ms: Option<u64>,
    max_ms: u64,
}

impl LatencyHistogram {
    /// Creates an empty histogram over [`DEFAULT_BUCKETS`].
    pub fn new() -> Self {
        Self::with_buckets(Arc::from(&DEFAULT_BUCKETS[..]))
    }

    /// Creates an empty histogram over the given bucket bounds.
    ///
    /// # Arguments
    ///
    /// * `buckets` - Strictly increasing upper bounds in milliseconds
    pub fn with_buckets(buckets: Arc<[u64]>) -> Self {
        debug_assert!(
            buckets.windows(2).all(|w| w[0] < w[1]),
            "histogram buckets must be strictly increasing"
        );
        let counts = vec![0; buckets.len()];
        Self {
            buckets,
            counts,
            total: 0,
            sum_ms: 0,
            min_ms: None,
            max_ms: 0,
        }
    }

    /// Records one latency sample.
    ///
    /// The duration is truncated to whole milliseconds before bucketing.
    pub fn observe(&mut self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        self.total += 1;
        self.sum_ms = self.sum_ms.saturating_add(ms);
        self.min_ms = Some(self.min_ms.map_or(ms, |min| min.min(ms)));
        self.max_ms = self.max_ms.max(ms);

        let idx = self
            .buckets
            .iter()
            .position(|&upper| ms <= upper)
            .unwrap_or(self.counts.len().saturating_sub(1));
        if let Some(count) = self.counts.get_mut(idx) {
            *count += 1;
        }
    }

    /// Mean latency in milliseconds, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.sum_ms as f64 / self.total as f64
    }

    /// Estimates the latency at percentile `p` (0-100), in milliseconds.
    ///
    /// # Returns
    ///
    /// - 0 when no samples were recorded
    /// - the observed minimum for `p <= 0`, maximum for `p >= 100`
    /// - otherwise the upper bound of the first bucket whose cumulative
    ///   count reaches `total * p / 100`
    pub fn percentile(&self, p: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if p <= 0.0 {
            return self.min();
        }
        if p >= 100.0 {
            return self.max();
        }

        let target = self.total as f64 * (p / 100.0);
        let mut accumulated = 0u64;
        for (upper, count) in self.buckets.iter().zip(&self.counts) {
            accumulated += count;
            if accumulated as f64 >= target {
                return *upper as f64;
            }
        }

        self.max()
    }

    /// Bucket upper bound → sample count, one entry per configured bucket.
    pub fn distribution(&self) -> BTreeMap<u64, u64> {
        self.buckets
            .iter()
            .copied()
            .zip(self.counts.iter().copied())
            .collect()
    }

    /// Smallest observed latency in milliseconds, 0 when empty.
    pub fn min(&self) -> f64 {
        self.min_ms.unwrap_or(0) as f64
    }

    /// Largest observed latency in milliseconds, 0 when empty.
    pub fn max(&self) -> f64 {
        self.max_ms as f64
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Number of samples recorded.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sum_ms(&self) -> u64 {
        self.sum_ms
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
