//! InsightIO Metrics Aggregation
//!
//! This crate provides the in-memory aggregation engine behind InsightIO:
//! event counters, sliding-window throughput, per-method error rates and
//! bucketed latency histograms.
//!
//! # Architecture
//!
//! - [`MetricStore`]: the single aggregation root, shared by `Arc` between
//!   writers (ingestion worker, call instrumentation) and readers (query
//!   service, admin routes)
//! - [`LatencyHistogram`]: fixed-bucket approximate latency distribution
//! - [`Clock`]: injectable time source so windows can be tested without
//!   sleeping
//! - [`StoreSnapshot`]: serializable view of every counter
//!
//! # Usage Example
//!
//! ```rust
//! use insightio_metrics::MetricStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(MetricStore::new(Duration::from_secs(60)));
//!
//! store.record_request("/insightio.IngestService/SendEvent");
//! store.record_error("/insightio.IngestService/SendEvent");
//!
//! assert_eq!(store.total_error_rate(), 100.0);
//! ```
//!
//! # Thread Safety
//!
//! Every store operation takes one readers-writer lock exactly once, so each
//! call is atomic on its own. Sequences of calls are not.

mod clock;
mod histogram;
mod snapshot;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use histogram::{LatencyHistogram, DEFAULT_BUCKETS};
pub use snapshot::{EndpointStats, LatencyStats, MethodSnapshot, StoreSnapshot};
pub use store::MetricStore;
