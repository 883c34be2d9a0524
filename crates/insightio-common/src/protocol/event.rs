//! Ingestion Types
//!
//! [`Event`] is the unit of ingestion; [`Ack`] is the logical accept/reject
//! answer an ingestion call returns. An `Ack` with `ok: false` is a normal
//! response, not an error: malformed events are rejected cheaply without
//! going through the error path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single analytics event.
///
/// Only `type` is required. Events are immutable once they enter the
/// ingestion queue.
///
/// # Example
///
/// ```
/// use insightio_common::protocol::Event;
///
/// let event = Event::new("page_view").with_user_id("user123");
/// assert!(event.has_type());
/// assert_eq!(event.user_id.as_deref(), Some("user123"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates an event of the given type with a fresh id and the current time.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns whether the event carries the one required field.
    pub fn has_type(&self) -> bool {
        !self.event_type.is_empty()
    }
}

/// Plain JSON payload accepted by the `/v1/event` gateway route.
///
/// The gateway enriches it with an id and timestamp before handing it to
/// the ingestion service (see [`Event::from_payload`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestPayload {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Event {
    /// Transcodes a gateway payload into an event, stamping id and time.
    pub fn from_payload(payload: IngestPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: payload.event_type,
            user_id: payload.user_id,
            value: payload.value,
            metadata: payload.metadata,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Acknowledgment returned by the ingestion calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    pub message: String,
}

impl Ack {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}
