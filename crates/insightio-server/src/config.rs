//! Server Configuration
//!
//! Settings are read from `INSIGHTIO_*` environment variables; the CLI
//! overlays its flags on top. Invalid input is reported as
//! [`InsightError::Config`] rather than aborting the process.
//!
//! | Variable                    | Field                 | Default   |
//! |-----------------------------|-----------------------|-----------|
//! | `INSIGHTIO_GRPC_PORT`       | `port`                | `50051`   |
//! | `INSIGHTIO_METRICS_WINDOW`  | `metrics_window_secs` | `60`      |
//! | `INSIGHTIO_API_KEY`         | `api_keys`            | required  |
//! | `INSIGHTIO_ENV`             | `env`                 | `dev`     |
//! | `INSIGHTIO_QUEUE_CAPACITY`  | `queue_capacity`      | `1000`    |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use insightio_common::protocol::error::{InsightError, Result};

pub const ENV_PORT: &str = "INSIGHTIO_GRPC_PORT";
pub const ENV_METRICS_WINDOW: &str = "INSIGHTIO_METRICS_WINDOW";
pub const ENV_API_KEY: &str = "INSIGHTIO_API_KEY";
pub const ENV_ENV: &str = "INSIGHTIO_ENV";
pub const ENV_QUEUE_CAPACITY: &str = "INSIGHTIO_QUEUE_CAPACITY";

pub const DEFAULT_PORT: u16 = 50051;
pub const DEFAULT_METRICS_WINDOW_SECS: u64 = 60;
pub const DEFAULT_ENV: &str = "dev";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind_host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Width of the sliding metrics window in seconds
    pub metrics_window_secs: u64,
    /// Accepted API keys; never empty after validation
    pub api_keys: Vec<String>,
    /// Deployment environment label, informational only
    pub env: String,
    /// Capacity of the bounded event queue
    pub queue_capacity: usize,
}

impl ServerConfig {
    /// Creates a configuration with default settings and the given keys.
    pub fn new<I, S>(api_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            metrics_window_secs: DEFAULT_METRICS_WINDOW_SECS,
            api_keys: api_keys.into_iter().map(Into::into).collect(),
            env: DEFAULT_ENV.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// # Example
    ///
    /// ```
    /// use insightio_server::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_lookup(|key| match key {
    ///     "INSIGHTIO_API_KEY" => Some("key-a, key-b".to_string()),
    ///     "INSIGHTIO_GRPC_PORT" => Some("6000".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.port, 6000);
    /// assert_eq!(config.api_keys, vec!["key-a", "key-b"]);
    /// assert_eq!(config.metrics_window_secs, 60);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_keys = lookup(ENV_API_KEY).unwrap_or_default();

        let config = Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: parse_var(&lookup, ENV_PORT, DEFAULT_PORT)?,
            metrics_window_secs: parse_var(&lookup, ENV_METRICS_WINDOW, DEFAULT_METRICS_WINDOW_SECS)?,
            api_keys: split_keys(&raw_keys),
            env: lookup(ENV_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ENV.to_string()),
            queue_capacity: parse_var(&lookup, ENV_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the server relies on.
    pub fn validate(&self) -> Result<()> {
        if self.api_keys.is_empty() {
            return Err(InsightError::Config(format!(
                "{} must contain at least one valid API key",
                ENV_API_KEY
            )));
        }
        if self.queue_capacity == 0 {
            return Err(InsightError::Config("queue capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// The metrics window as a `Duration`.
    pub fn metrics_window(&self) -> Duration {
        Duration::from_secs(self.metrics_window_secs)
    }

    /// Address the server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }
}

/// Splits a comma-separated key list, trimming whitespace and dropping empties.
pub fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| InsightError::Config(format!("invalid value for {}: '{}'", key, raw))),
        _ => Ok(default),
    }
}
