//! InsightIO Server
//!
//! This crate provides the InsightIO ingestion and metrics server: a bounded
//! ingestion pipeline feeding a shared [`MetricStore`](insightio_metrics::MetricStore),
//! a read-side query service, and the HTTP glue exposing both as RPCs.
//!
//! # Architecture
//!
//! ```text
//! client ──► InterceptorChain ──► IngestService ──► event queue ──► IngestWorker
//!               │  (instrument, auth)                                   │
//!               └──────────────► MetricsService ◄──── MetricStore ◄─────┘
//! ```
//!
//! - [`config`]: environment-driven [`ServerConfig`]
//! - [`interceptor`]: per-call instrumentation and API key authentication
//! - [`ingest`]: validation, the bounded queue and its single worker
//! - [`metrics_service`]: point queries, subscriptions and endpoint stats
//! - [`http_router`] / [`http_server`]: axum routes and the composition root

pub mod config;
pub mod http_router;
pub mod http_server;
pub mod ingest;
pub mod interceptor;
pub mod metrics_service;

pub use config::ServerConfig;
pub use http_server::Server;
pub use ingest::{IngestService, IngestWorker};
pub use interceptor::InterceptorChain;
pub use metrics_service::MetricsService;
