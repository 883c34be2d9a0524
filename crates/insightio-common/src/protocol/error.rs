use thiserror::Error;

/// Errors raised by InsightIO components outside the RPC status path.
///
/// Handlers convert these into a [`Status`](super::Status) before they reach
/// the caller; the variants mostly describe plumbing failures (bodies that
/// could not be read, JSON that could not be parsed, a listener that could
/// not be bound).
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event queue closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::net::AddrParseError> for InsightError {
    fn from(err: std::net::AddrParseError) -> Self {
        InsightError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
