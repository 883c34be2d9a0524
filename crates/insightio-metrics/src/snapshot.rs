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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::histogram::LatencyHistogram;

/// Summary statistics of one method's latency histogram, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub total_requests: u64,
}

impl LatencyStats {
    pub fn from_histogram(hist: &LatencyHistogram) -> Self {
        Self {
            min: hist.min(),
            max: hist.max(),
            avg: hist.average(),
            median: hist.median(),
            p95: hist.percentile(95.0),
            p99: hist.percentile(99.0),
            total_requests: hist.total(),
        }
    }
}

/// One entry of the slowest-endpoints ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStats {
    pub method: String,
    pub avg_ms: f64,
    pub requests: u64,
    pub errors: u64,
}

/// Counters of a single RPC method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub throughput: f64,
    pub error_rate: f64,
    pub latency: LatencyStats,
}

/// Complete, serializable view of a metric store at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub window_secs: f64,
    pub total_events: u64,
    pub events_per_window: u64,
    pub event_types: BTreeMap<String, u64>,
    pub total_throughput: f64,
    pub total_error_rate: f64,
    pub methods: BTreeMap<String, MethodSnapshot>,
}
