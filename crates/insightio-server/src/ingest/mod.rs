//! Event Ingestion
//!
//! Producers ([`IngestService`]) push validated events onto a bounded queue;
//! a single [`IngestWorker`] drains it into the shared metric store.
//!
//! ```text
//! SendEvent / SendEventStream ──► EventSender ══ bounded mpsc ══► EventReceiver ──► IngestWorker ──► MetricStore
//! ```
//!
//! A full queue makes producers wait, which slows callers down instead of
//! growing memory.

mod queue;
mod service;
mod worker;

pub use queue::{event_queue, EventReceiver, EventSender};
pub use service::{IngestService, MSG_EVENT_MISSING, MSG_EVENT_RECEIVED, MSG_STREAM_RECEIVED};
pub use worker::{IngestWorker, WorkerHandle};
