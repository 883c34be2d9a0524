//! # InsightIO CLI
//!
//! Command-line interface for the InsightIO telemetry server.
//!
//! - `insightio serve`: run the ingestion and metrics server
//! - `insightio send`: post one event and print the acknowledgment
//! - `insightio metrics`: query current metric values
//!
//! The `send` and `metrics` commands talk to a running server through
//! [`client::InsightClient`] and print raw JSON, so their output can be piped
//! into tools like `jq`.

pub mod client;

use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Validates that a URL string starts with http:// or https://
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

/// Parses repeated `key=value` arguments into event metadata.
///
/// The value may itself contain `=`; the key may not be empty.
pub fn parse_metadata(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(anyhow!("Invalid metadata '{}': expected key=value", pair)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:50051", "server").is_ok());
        assert!(validate_http_url("https://metrics.example.com", "server").is_ok());

        let err = validate_http_url("127.0.0.1:50051", "server address").unwrap_err();
        assert!(err.to_string().contains("server address"));
    }

    #[test]
    fn test_parse_metadata() {
        let pairs = vec!["plan=pro".to_string(), "query=a=b".to_string()];
        let metadata = parse_metadata(&pairs).unwrap();
        assert_eq!(metadata["plan"], "pro");
        assert_eq!(metadata["query"], "a=b");
        assert!(parse_metadata(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_metadata_rejects_malformed_pairs() {
        assert!(parse_metadata(&["novalue".to_string()]).is_err());
        assert!(parse_metadata(&["=value".to_string()]).is_err());
    }
}
