//! HTTP Transport Utilities
//!
//! InsightIO RPCs travel over plain HTTP/1.1. Every call is a `POST` to the
//! method's fully-qualified path (see [`crate::protocol::methods`]); unary
//! requests and responses are JSON documents, streaming ones are NDJSON
//! bodies (see [`super::NdjsonCodec`]).
//!
//! # Components
//!
//! - **[`HttpTransport`]**: Helpers converting between HTTP bodies and
//!   protocol messages
//! - An [`IntoResponse`] impl for [`Status`], so handlers can return
//!   `Result<_, Status>` directly
//!
//! # Example
//!
//! ```
//! use insightio_common::transport::HttpTransport;
//! use insightio_common::protocol::{Ack, Status};
//! use http::StatusCode;
//!
//! let ok = HttpTransport::json(StatusCode::OK, &Ack::accepted("fine"));
//! assert_eq!(ok.status(), StatusCode::OK);
//!
//! let err = HttpTransport::status(&Status::unauthenticated("API key is missing"));
//! assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
//! ```

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::codec::NdjsonCodec;
use crate::protocol::Status;

const APPLICATION_JSON: &str = "application/json";

/// HTTP transport utility functions
pub struct HttpTransport;

impl HttpTransport {
    /// Parses a unary request body.
    ///
    /// An empty body is treated as `{}` so that requests whose fields all
    /// have defaults can be sent without one.
    ///
    /// # Returns
    ///
    /// The decoded message, or an `invalid_argument` status
    pub fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, Status> {
        let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &body[..]
        };
        serde_json::from_slice(raw)
            .map_err(|e| Status::invalid_argument(format!("malformed request body: {}", e)))
    }

    /// Builds a JSON response with the given status code.
    ///
    /// Serialization failures become a 500 response.
    pub fn json<T: Serialize>(status: StatusCode, message: &T) -> Response {
        match serde_json::to_vec(message) {
            Ok(body) => Self::with_content_type(status, APPLICATION_JSON, Body::from(body)),
            Err(e) => Self::status(&Status::internal(format!("failed to encode response: {}", e))),
        }
    }

    /// Builds the error response for a non-OK RPC status.
    ///
    /// The body is the JSON-encoded status (`{"code": ..., "message": ...}`).
    pub fn status(status: &Status) -> Response {
        let body = serde_json::to_vec(status).unwrap_or_default();
        Self::with_content_type(status.code.http_status(), APPLICATION_JSON, Body::from(body))
    }

    /// Wraps an already-streaming body as an NDJSON response.
    pub fn ndjson(body: Body) -> Response {
        Self::with_content_type(StatusCode::OK, NdjsonCodec::CONTENT_TYPE, body)
    }

    /// Decodes an error response produced by [`HttpTransport::status`].
    ///
    /// Used by clients; bodies that are not a status (a proxy error page,
    /// say) are mapped onto a status built from the HTTP code.
    pub fn decode_status(code: StatusCode, body: &[u8]) -> Status {
        serde_json::from_slice(body).unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                code.to_string()
            } else {
                text
            };
            match code {
                StatusCode::BAD_REQUEST => Status::invalid_argument(message),
                StatusCode::UNAUTHORIZED => Status::unauthenticated(message),
                StatusCode::SERVICE_UNAVAILABLE => Status::unavailable(message),
                StatusCode::GATEWAY_TIMEOUT => Status::deadline_exceeded(message),
                _ => Status::internal(message),
            }
        })
    }

    fn with_content_type(status: StatusCode, content_type: &'static str, body: Body) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        HttpTransport::status(&self)
    }
}
