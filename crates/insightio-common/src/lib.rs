//! InsightIO Common Types and Transport
//!
//! This crate provides the protocol definitions, API key authentication and
//! HTTP transport helpers shared by the InsightIO server and its clients.
//!
//! # Overview
//!
//! InsightIO ingests analytics events and answers near-real-time metric
//! queries about them. Everything that both sides of a call need to agree
//! on lives here:
//!
//! - **Protocol Layer**: [`Event`], [`Ack`], metric queries, [`Status`] and
//!   the fully-qualified method names
//! - **Authentication**: [`auth::ApiKeyValidator`] and the `x-api-key` header
//! - **Transport Layer**: JSON and NDJSON over HTTP
//!
//! # Components
//!
//! - [`protocol`] - Message types, status codes and errors
//! - [`auth`] - API key validation
//! - [`transport`] - Codecs and HTTP helpers
//!
//! # Example
//!
//! ```
//! use insightio_common::{Ack, Event, Status};
//!
//! let event = Event::new("purchase").with_value(19.99);
//! assert!(event.has_type());
//!
//! let ack = Ack::accepted("Event received successfully");
//! assert!(ack.ok);
//!
//! let status = Status::unavailable("event queue is full");
//! assert_eq!(status.code.http_status().as_u16(), 503);
//! ```

pub mod auth;
pub mod protocol;
pub mod transport;

pub use protocol::*;
