//! Fully-qualified RPC method names.
//!
//! These double as the HTTP route paths and as the keys under which the
//! interceptor chain records per-method metrics.

pub const SEND_EVENT: &str = "/insightio.IngestService/SendEvent";
pub const SEND_EVENT_STREAM: &str = "/insightio.IngestService/SendEventStream";
pub const GET_METRICS: &str = "/insightio.MetricsService/GetMetrics";
pub const SUBSCRIBE_METRICS: &str = "/insightio.MetricsService/SubscribeMetrics";
pub const GET_ENDPOINT_STATS: &str = "/insightio.MetricsService/GetEndpointStats";

/// Every RPC method the server exposes.
pub const ALL: [&str; 5] = [
    SEND_EVENT,
    SEND_EVENT_STREAM,
    GET_METRICS,
    SUBSCRIBE_METRICS,
    GET_ENDPOINT_STATS,
];
