//! Metrics Query Service
//!
//! Read-side API over the shared [`MetricStore`]: point queries, a periodic
//! push subscription, and the slowest-endpoints ranking.

use std::sync::Arc;
use std::time::Duration;

use insightio_common::{GetMetricsRequest, Metric, MetricName, MetricResponse, Status};
use insightio_metrics::{EndpointStats, LatencyStats, MetricStore};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Delay between two pushes of a metrics subscription.
pub const SUBSCRIPTION_INTERVAL: Duration = Duration::from_secs(2);

/// Number of endpoints returned when a stats request does not say.
pub const DEFAULT_TOP_K: usize = 5;

/// Request body of `GetEndpointStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatsRequest {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for EndpointStatsRequest {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// One ranked endpoint with its full latency summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointReport {
    #[serde(flatten)]
    pub stats: EndpointStats,
    pub latency: LatencyStats,
}

/// Response body of `GetEndpointStats`, slowest endpoint first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatsResponse {
    pub endpoints: Vec<EndpointReport>,
}

#[derive(Debug, Clone)]
pub struct MetricsService {
    store: Arc<MetricStore>,
    interval: Duration,
}

impl MetricsService {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self::with_interval(store, SUBSCRIPTION_INTERVAL)
    }

    /// Creates a service whose subscriptions push every `interval`.
    pub fn with_interval(store: Arc<MetricStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Returns the current value of each requested metric.
    ///
    /// Unknown names are logged and skipped. An empty request returns every
    /// metric in [`MetricName::ALL`] order.
    pub fn get_metrics(&self, request: &GetMetricsRequest) -> MetricResponse {
        let names: Vec<MetricName> = if request.metric_names.is_empty() {
            MetricName::ALL.to_vec()
        } else {
            request
                .metric_names
                .iter()
                .filter_map(|raw| match raw.parse() {
                    Ok(name) => Some(name),
                    Err(err) => {
                        warn!(metric = %raw, error = %err, "Ignoring unknown metric");
                        None
                    }
                })
                .collect()
        };

        MetricResponse {
            metrics: names.into_iter().map(|name| self.read(name)).collect(),
        }
    }

    /// Pushes the subscription metrics into `tx` every interval.
    ///
    /// The first push happens one interval after the call. Returns `Ok` once
    /// the receiving side is dropped between ticks, or `cancelled` if a send
    /// fails mid-tick.
    pub async fn subscribe_metrics(&self, tx: mpsc::Sender<Metric>) -> Result<(), Status> {
        info!("Metrics subscriber connected");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for name in MetricName::SUBSCRIPTION {
                        if tx.send(self.read(name)).await.is_err() {
                            warn!(metric = %name, "Failed to push metric, ending subscription");
                            return Err(Status::cancelled("subscriber went away mid-update"));
                        }
                    }
                    debug!("Pushed metrics update");
                }
                _ = tx.closed() => {
                    info!("Metrics subscriber disconnected");
                    return Ok(());
                }
            }
        }
    }

    /// Ranks the `top_k` slowest methods by average latency.
    pub fn get_endpoint_stats(&self, request: &EndpointStatsRequest) -> EndpointStatsResponse {
        let endpoints = self
            .store
            .top_slowest_endpoints(request.top_k)
            .into_iter()
            .map(|stats| EndpointReport {
                latency: self.store.latency_stats(&stats.method),
                stats,
            })
            .collect();
        EndpointStatsResponse { endpoints }
    }

    fn read(&self, name: MetricName) -> Metric {
        let value = match name {
            MetricName::TotalEvents => self.store.total_events() as f64,
            MetricName::EventsPerWindow => self.store.events_per_window() as f64,
            MetricName::TotalThroughput => self.store.total_throughput(),
            MetricName::TotalErrorRate => self.store.total_error_rate(),
        };
        Metric::now(name, value)
    }
}
