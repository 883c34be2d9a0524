//! In-process server harness shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use insightio_common::auth::API_KEY_HEADER;
use insightio_metrics::MetricStore;
use insightio_server::{Server, ServerConfig};
use reqwest::Client;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const API_KEY: &str = "integration-key";

/// A server bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MetricStore>,
    pub client: Client,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|config| config, Duration::from_secs(2)).await
    }

    /// Starts a server after letting `configure` adjust the defaults.
    pub async fn start_with<F>(configure: F, subscription_interval: Duration) -> Self
    where
        F: FnOnce(ServerConfig) -> ServerConfig,
    {
        let config = configure(ServerConfig::new([API_KEY]));
        let server = Server::new(config)
            .expect("Failed to build server")
            .with_subscription_interval(subscription_interval);
        let store = server.store();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = stopped.await;
                })
                .await
                .expect("Server failed");
        });

        Self {
            addr,
            store,
            client: Client::new(),
            stop: Some(stop),
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POSTs a JSON body with the given API key.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        key: Option<&str>,
        body: &T,
    ) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = key {
            request = request.header(API_KEY_HEADER, key);
        }
        request.send().await.expect("Request failed")
    }

    /// Waits until the worker has aggregated `expected` events.
    pub async fn wait_for_events(&self, expected: u64) {
        let store = self.store.clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            while store.total_events() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Worker did not aggregate events in time");
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut self.task).await;
    }
}
