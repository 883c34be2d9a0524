//! RPC Status Values
//!
//! A [`Status`] is what an RPC call returns to its caller when it does not
//! complete normally. It is deliberately shaped like a gRPC status: a coarse
//! machine-readable [`Code`] plus a human-readable message. The HTTP
//! transport maps codes onto response status codes (see
//! [`Code::http_status`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::error::InsightError;

/// Coarse classification of an RPC failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// The request body or one of its items could not be understood.
    InvalidArgument,
    /// The caller did not present an accepted API key.
    Unauthenticated,
    /// The call did not finish before its deadline.
    DeadlineExceeded,
    /// A downstream component is not able to accept work.
    Unavailable,
    /// The caller went away before the call completed.
    Cancelled,
    /// Anything else.
    Internal,
}

impl Code {
    /// HTTP status code used when this code is sent over the HTTP transport.
    pub fn http_status(self) -> http::StatusCode {
        match self {
            Code::InvalidArgument => http::StatusCode::BAD_REQUEST,
            Code::Unauthenticated => http::StatusCode::UNAUTHORIZED,
            Code::DeadlineExceeded => http::StatusCode::GATEWAY_TIMEOUT,
            Code::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            // 499 "client closed request"; always in range so the fallback is unreachable.
            Code::Cancelled => http::StatusCode::from_u16(499)
                .unwrap_or(http::StatusCode::BAD_REQUEST),
            Code::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::InvalidArgument => "invalid_argument",
            Code::Unauthenticated => "unauthenticated",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::Unavailable => "unavailable",
            Code::Cancelled => "cancelled",
            Code::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// The error value of an RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}


impl From<InsightError> for Status {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::JsonSerialization(e) => Status::invalid_argument(e.to_string()),
            InsightError::InvalidRequest(msg) => Status::invalid_argument(msg),
            InsightError::QueueClosed => Status::unavailable("event queue closed"),
            InsightError::Transport(msg) => Status::cancelled(msg),
            other => Status::internal(other.to_string()),
        }
    }
}
