//! Authentication Layer for InsightIO
//!
//! This module provides API key authentication for every InsightIO RPC call.
//! Callers present a key in the `x-api-key` request header; the server
//! checks it against a set of accepted keys held by an [`ApiKeyValidator`].
//!
//! # Architecture
//!
//! - The validator is built once at startup from the configured keys and
//!   shared by reference with the interceptor chain.
//! - Keys can be added or revoked at runtime; lookups take a shared lock
//!   and are O(1).
//! - A rejected key surfaces as an `unauthenticated` status (HTTP 401).
//!
//! # Example
//!
//! ```
//! use insightio_common::auth::{ApiKeyValidator, AuthError};
//!
//! let validator = ApiKeyValidator::new(["test-api-key-123"]);
//!
//! assert!(validator.validate(Some("test-api-key-123")).is_ok());
//! assert_eq!(validator.validate(Some("wrong")), Err(AuthError::InvalidCredential));
//! assert_eq!(validator.validate(None), Err(AuthError::MissingCredential));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::protocol::Status;

/// Request header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reasons a credential check can fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("API key is missing")]
    MissingCredential,

    #[error("API key is invalid")]
    InvalidCredential,
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        Status::unauthenticated(err.to_string())
    }
}

/// Thread-safe set of accepted API keys.
///
/// Reads (validation) are far more frequent than writes (key rotation), so
/// the set sits behind a readers-writer lock.
///
/// # Example
///
/// ```
/// use insightio_common::auth::ApiKeyValidator;
///
/// let validator = ApiKeyValidator::new(["k1"]);
/// validator.add_key("k2");
/// assert!(validator.validate(Some("k2")).is_ok());
///
/// validator.remove_key("k2");
/// assert!(validator.validate(Some("k2")).is_err());
/// ```
pub struct ApiKeyValidator {
    valid_keys: RwLock<HashSet<String>>,
}

impl ApiKeyValidator {
    /// Creates a validator accepting the given keys.
    ///
    /// # Arguments
    ///
    /// * `keys` - The initial set of accepted keys
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_keys: RwLock::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Starts accepting `key`.
    pub fn add_key(&self, key: impl Into<String>) {
        let mut keys = self.valid_keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.insert(key.into()) {
            debug!(keys = keys.len(), "API key added");
        }
    }

    /// Stops accepting `key`. Removing an unknown key is a no-op.
    pub fn remove_key(&self, key: &str) {
        let mut keys = self.valid_keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.remove(key) {
            debug!(keys = keys.len(), "API key revoked");
        }
    }

    /// Number of accepted keys.
    pub fn len(&self) -> usize {
        self.valid_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks a presented credential.
    ///
    /// # Arguments
    ///
    /// * `presented` - The value of the `x-api-key` header, if any
    ///
    /// # Returns
    ///
    /// `Ok(())` when the key is accepted, [`AuthError::MissingCredential`] when
    /// no (or an empty) key was presented, [`AuthError::InvalidCredential`]
    /// otherwise. Validation has no side effects.
    pub fn validate(&self, presented: Option<&str>) -> Result<(), AuthError> {
        let key = match presented {
            Some(key) if !key.is_empty() => key,
            _ => return Err(AuthError::MissingCredential),
        };

        let keys = self.valid_keys.read().unwrap_or_else(PoisonError::into_inner);
        if keys.contains(key) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

impl fmt::Debug for ApiKeyValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the keys themselves.
        write!(f, "ApiKeyValidator({} key(s))", self.len())
    }
}

/// Extracts the API key from request headers.
///
/// Returns `None` when the header is absent or not valid visible ASCII.
///
/// # Example
///
/// ```
/// use insightio_common::auth::extract_api_key;
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// assert_eq!(extract_api_key(&headers), None);
///
/// headers.insert("x-api-key", "my-secret-key".parse().unwrap());
/// assert_eq!(extract_api_key(&headers), Some("my-secret-key"));
/// ```
pub fn extract_api_key(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
}
