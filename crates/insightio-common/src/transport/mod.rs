//! InsightIO Transport Layer
//!
//! Helpers for carrying protocol messages over HTTP.
//!
//! # Wire Format
//!
//! - **Unary calls**: `POST <method path>` with a JSON body, answered by a
//!   JSON body. Non-OK outcomes carry a JSON [`Status`](crate::protocol::Status)
//!   and an HTTP code derived from its [`Code`](crate::protocol::Code).
//! - **Streaming calls**: the streamed side is newline-delimited JSON, one
//!   message per line.
//!
//! # Components
//!
//! - **[`NdjsonCodec`]**: Encode/decode single NDJSON lines
//! - **[`LineDecoder`]**: Reassemble lines from arbitrarily chunked bodies
//! - **[`HttpTransport`]**: Build axum responses and parse request bodies

pub mod codec;
pub mod http;

pub use codec::{LineDecoder, NdjsonCodec};
pub use http::HttpTransport;

#[cfg(test)]
mod tests;
