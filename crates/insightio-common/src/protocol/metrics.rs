//! Metrics Query Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The fixed set of metric names the query service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    TotalEvents,
    EventsPerWindow,
    TotalThroughput,
    TotalErrorRate,
}

impl MetricName {
    /// Every recognized metric, in the order returned for an empty query.
    pub const ALL: [MetricName; 4] = [
        MetricName::TotalEvents,
        MetricName::EventsPerWindow,
        MetricName::TotalThroughput,
        MetricName::TotalErrorRate,
    ];

    /// Metrics pushed on every subscription tick.
    pub const SUBSCRIPTION: [MetricName; 3] = [
        MetricName::EventsPerWindow,
        MetricName::TotalThroughput,
        MetricName::TotalErrorRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::TotalEvents => "total_events",
            MetricName::EventsPerWindow => "events_per_window",
            MetricName::TotalThroughput => "total_throughput",
            MetricName::TotalErrorRate => "total_error_rate",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a metric name is not part of [`MetricName::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// A single metric value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Creates a metric stamped with the current time.
    pub fn now(name: MetricName, value: f64) -> Self {
        Self {
            name: name.as_str().to_string(),
            value,
            timestamp: Utc::now(),
        }
    }
}

/// Request body of `GetMetrics` and `SubscribeMetrics`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetricsRequest {
    #[serde(default)]
    pub metric_names: Vec<String>,
}

impl GetMetricsRequest {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric_names: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Response body of `GetMetrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResponse {
    pub metrics: Vec<Metric>,
}

impl MetricResponse {
    /// Looks up a returned metric by name.
    pub fn get(&self, name: MetricName) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name.as_str())
    }
}
