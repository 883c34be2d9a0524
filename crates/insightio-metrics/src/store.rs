// Copyright 2025 InsightIO Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::histogram::{LatencyHistogram, DEFAULT_BUCKETS};
use crate::snapshot::{EndpointStats, LatencyStats, MethodSnapshot, StoreSnapshot};

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct Inner {
    total_events: u64,
    /// Cumulative per-type counts, never evicted
    event_type_counts: HashMap<String, u64>,
    /// Event arrival times inside the window, oldest first
    event_timestamps: VecDeque<Instant>,
    /// Cumulative per-method counters, never evicted
    req_count: HashMap<String, u64>,
    err_count: HashMap<String, u64>,
    /// Per-method request arrival times inside the window, oldest first
    req_timestamps: HashMap<String, VecDeque<Instant>>,
    /// Per-method histograms, created on first latency sample
    latency: HashMap<String, LatencyHistogram>,
}

/// Concurrent, windowed aggregation of events and RPC call statistics.
///
/// A single instance is created at startup and shared by `Arc` between the
/// ingestion worker (writes events), the interceptor chain (writes call
/// statistics) and the query service (reads).
///
/// # Concurrency
///
/// All state sits behind one `RwLock`. Every public method takes the lock
/// exactly once, so each operation is atomic on its own; writers are
/// exclusive and readers share. A poisoned lock is recovered rather than
/// propagated.
///
/// # Windows
///
/// Event and request timestamps are kept only while they fall inside
/// `(now - window, now]`. Eviction happens inline on every write. Reads
/// re-scan the retained timestamps against the current time, so a reader
/// sees the window slide even when no writes arrive.
///
/// # Example
///
/// ```
/// use insightio_metrics::MetricStore;
/// use std::time::Duration;
///
/// let store = MetricStore::new(Duration::from_secs(60));
/// store.add_event("page_view");
/// store.add_event("purchase");
///
/// store.record_request("/svc/Call");
/// store.record_latency("/svc/Call", Duration::from_millis(12));
///
/// assert_eq!(store.total_events(), 2);
/// assert_eq!(store.event_type_count("purchase"), 1);
/// assert_eq!(store.latency_stats("/svc/Call").total_requests, 1);
/// ```
#[derive(Debug)]
pub struct MetricStore {
    inner: RwLock<Inner>,
    window: Duration,
    buckets: Arc<[u64]>,
    clock: Arc<dyn Clock>,
}

impl MetricStore {
    /// Creates a store with the given sliding window, on the system clock.
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Creates a store reading time from `clock`.
    ///
    /// # Arguments
    ///
    /// * `window` - Width of the sliding window used for windowed counts
    /// * `clock` - Time source; tests pass a [`ManualClock`](crate::ManualClock)
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            window,
            buckets: Arc::from(&DEFAULT_BUCKETS[..]),
            clock,
        }
    }

    /// Width of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oldest instant that is already outside the window, if representable.
    fn threshold(&self, now: Instant) -> Option<Instant> {
        now.checked_sub(self.window)
    }

    // ---- writes ---------------------------------------------------------

    /// Counts one event of type `event_type`.
    pub fn add_event(&self, event_type: &str) {
        let now = self.clock.now();
        let threshold = self.threshold(now);
        let mut inner = self.write();

        inner.total_events += 1;
        *inner
            .event_type_counts
            .entry(event_type.to_string())
            .or_insert(0) += 1;
        inner.event_timestamps.push_back(now);
        evict(&mut inner.event_timestamps, threshold);
    }

    /// Counts one call to `method`.
    pub fn record_request(&self, method: &str) {
        let now = self.clock.now();
        let threshold = self.threshold(now);
        let mut inner = self.write();

        *inner.req_count.entry(method.to_string()).or_insert(0) += 1;
        let timestamps = inner
            .req_timestamps
            .entry(method.to_string())
            .or_default();
        timestamps.push_back(now);
        evict(timestamps, threshold);
    }

    /// Counts one failed call to `method`.
    pub fn record_error(&self, method: &str) {
        *self.write().err_count.entry(method.to_string()).or_insert(0) += 1;
    }

    /// Adds a latency sample to `method`'s histogram, creating it if needed.
    pub fn record_latency(&self, method: &str, duration: Duration) {
        let mut inner = self.write();
        match inner.latency.get_mut(method) {
            Some(hist) => hist.observe(duration),
            None => {
                tracing::debug!(method, "creating latency histogram");
                let mut hist = LatencyHistogram::with_buckets(Arc::clone(&self.buckets));
                hist.observe(duration);
                inner.latency.insert(method.to_string(), hist);
            }
        }
    }

    // ---- event reads ----------------------------------------------------

    pub fn total_events(&self) -> u64 {
        self.read().total_events
    }

    /// Cumulative count of events of `event_type`, 0 if never seen.
    pub fn event_type_count(&self, event_type: &str) -> u64 {
        self.read()
            .event_type_counts
            .get(event_type)
            .copied()
            .unwrap_or(0)
    }

    /// Number of events that arrived within the current window.
    pub fn events_per_window(&self) -> u64 {
        let threshold = self.threshold(self.clock.now());
        count_in_window(&self.read().event_timestamps, threshold)
    }

    // ---- request reads --------------------------------------------------

    pub fn request_count(&self, method: &str) -> u64 {
        self.read().req_count.get(method).copied().unwrap_or(0)
    }

    pub fn error_count(&self, method: &str) -> u64 {
        self.read().err_count.get(method).copied().unwrap_or(0)
    }

    /// Requests per second to `method` over the current window.
    pub fn throughput(&self, method: &str) -> f64 {
        let threshold = self.threshold(self.clock.now());
        let count = self
            .read()
            .req_timestamps
            .get(method)
            .map_or(0, |ts| count_in_window(ts, threshold));
        self.per_second(count)
    }

    /// Requests per second across all methods over the current window.
    pub fn total_throughput(&self) -> f64 {
        let threshold = self.threshold(self.clock.now());
        let count = total_in_window(&self.read(), threshold);
        self.per_second(count)
    }

    /// Errors as a percentage of requests for `method`, 0 without requests.
    pub fn error_rate(&self, method: &str) -> f64 {
        let inner = self.read();
        let requests = inner.req_count.get(method).copied().unwrap_or(0);
        let errors = inner.err_count.get(method).copied().unwrap_or(0);
        percentage(errors, requests)
    }

    /// Errors as a percentage of requests across all methods.
    ///
    /// Only methods that have recorded at least one request contribute
    /// errors to the numerator.
    pub fn total_error_rate(&self) -> f64 {
        total_error_rate(&self.read())
    }

    // ---- latency reads --------------------------------------------------

    /// Estimated latency of `method` at percentile `p`, 0 if unknown.
    pub fn latency_percentile(&self, method: &str, p: f64) -> f64 {
        self.read()
            .latency
            .get(method)
            .map_or(0.0, |hist| hist.percentile(p))
    }

    /// Bucket upper bound → count for `method`; empty if unknown.
    pub fn latency_distribution(&self, method: &str) -> BTreeMap<u64, u64> {
        self.read()
            .latency
            .get(method)
            .map(LatencyHistogram::distribution)
            .unwrap_or_default()
    }

    /// Summary statistics for `method`; all zeros if unknown.
    pub fn latency_stats(&self, method: &str) -> LatencyStats {
        self.read()
            .latency
            .get(method)
            .map(LatencyStats::from_histogram)
            .unwrap_or_default()
    }

    /// The `k` methods with the highest average latency, slowest first.
    ///
    /// Only methods with a latency histogram are ranked; `k` is clamped to
    /// their number. Ties keep no particular order.
    pub fn top_slowest_endpoints(&self, k: usize) -> Vec<EndpointStats> {
        let inner = self.read();
        let mut ranked: Vec<EndpointStats> = inner
            .latency
            .iter()
            .map(|(method, hist)| EndpointStats {
                method: method.clone(),
                avg_ms: hist.average(),
                requests: inner.req_count.get(method).copied().unwrap_or(0),
                errors: inner.err_count.get(method).copied().unwrap_or(0),
            })
            .collect();
        drop(inner);

        ranked.sort_by(|a, b| b.avg_ms.total_cmp(&a.avg_ms));
        ranked.truncate(k);
        ranked
    }

    /// Captures every counter under a single read lock.
    pub fn snapshot(&self) -> StoreSnapshot {
        let threshold = self.threshold(self.clock.now());
        let inner = self.read();

        let mut methods: BTreeMap<String, MethodSnapshot> = BTreeMap::new();
        let names = inner
            .req_count
            .keys()
            .chain(inner.err_count.keys())
            .chain(inner.latency.keys());
        for method in names {
            if methods.contains_key(method) {
                continue;
            }
            let requests = inner.req_count.get(method).copied().unwrap_or(0);
            let errors = inner.err_count.get(method).copied().unwrap_or(0);
            let windowed = inner
                .req_timestamps
                .get(method)
                .map_or(0, |ts| count_in_window(ts, threshold));
            methods.insert(
                method.clone(),
                MethodSnapshot {
                    requests,
                    errors,
                    throughput: self.per_second(windowed),
                    error_rate: percentage(errors, requests),
                    latency: inner
                        .latency
                        .get(method)
                        .map(LatencyStats::from_histogram)
                        .unwrap_or_default(),
                },
            );
        }

        StoreSnapshot {
            window_secs: self.window.as_secs_f64(),
            total_events: inner.total_events,
            events_per_window: count_in_window(&inner.event_timestamps, threshold),
            event_types: inner
                .event_type_counts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            total_throughput: self.per_second(total_in_window(&inner, threshold)),
            total_error_rate: total_error_rate(&inner),
            methods,
        }
    }

    fn per_second(&self, count: u64) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        count as f64 / secs
    }
}

fn in_window(ts: Instant, threshold: Option<Instant>) -> bool {
    threshold.map_or(true, |t| ts > t)
}

/// Drops timestamps that fell out of the window. Entries are appended in
/// clock order, so expired ones are always at the front.
fn evict(timestamps: &mut VecDeque<Instant>, threshold: Option<Instant>) {
    while let Some(&oldest) = timestamps.front() {
        if in_window(oldest, threshold) {
            break;
        }
        timestamps.pop_front();
    }
}

fn count_in_window(timestamps: &VecDeque<Instant>, threshold: Option<Instant>) -> u64 {
    timestamps
        .iter()
        .filter(|&&ts| in_window(ts, threshold))
        .count() as u64
}

fn total_in_window(inner: &Inner, threshold: Option<Instant>) -> u64 {
    inner
        .req_timestamps
        .values()
        .map(|ts| count_in_window(ts, threshold))
        .sum()
}

fn total_error_rate(inner: &Inner) -> f64 {
    let (requests, errors) = inner
        .req_count
        .iter()
        .fold((0u64, 0u64), |(reqs, errs), (method, count)| {
            let method_errors = inner.err_count.get(method).copied().unwrap_or(0);
            (reqs + count, errs + method_errors)
        });
    percentage(errors, requests)
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
