//! Minimal HTTP client for a running InsightIO server.

use anyhow::{Context, Result};
use insightio_common::auth::API_KEY_HEADER;
use insightio_common::protocol::methods;
use insightio_common::transport::HttpTransport;
use insightio_common::{Ack, Event, GetMetricsRequest, MetricResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::validate_http_url;

#[derive(Debug, Clone)]
pub struct InsightClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl InsightClient {
    /// Creates a client for the server at `base_url`.
    ///
    /// No connection is made until the first call.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        validate_http_url(base_url, "server address")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send_event(&self, event: &Event) -> Result<Ack> {
        self.call(methods::SEND_EVENT, event).await
    }

    pub async fn get_metrics(&self, request: &GetMetricsRequest) -> Result<MetricResponse> {
        self.call(methods::GET_METRICS, request).await
    }

    /// Makes one unary call.
    ///
    /// A non-2xx reply is decoded into the server's status and returned as
    /// the error.
    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response from {}", url))?;

        if !status.is_success() {
            return Err(HttpTransport::decode_status(status, &body).into());
        }

        serde_json::from_slice(&body).with_context(|| format!("Invalid response from {}", method))
    }
}
