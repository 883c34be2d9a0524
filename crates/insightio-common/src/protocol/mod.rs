pub mod error;
pub mod event;
pub mod methods;
pub mod metrics;
pub mod status;


pub use error::{InsightError, Result};
pub use event::{Ack, Event, IngestPayload};
pub use metrics::{GetMetricsRequest, Metric, MetricName, MetricResponse, UnknownMetric};
pub use status::{Code, Status};
