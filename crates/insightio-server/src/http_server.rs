//! HTTP Server
//!
//! [`Server`] is the composition root: it builds the metric store, the
//! event queue and its worker, the API key validator, the interceptor chain
//! and both services exactly once, then serves them over axum.
//!
//! # Example
//!
//! ```no_run
//! use insightio_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::new(["my-key"]);
//!     let addr = config.socket_addr();
//!     let server = Server::new(config).unwrap();
//!     server.run(addr).await.unwrap();
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use insightio_common::auth::ApiKeyValidator;
use insightio_common::protocol::error::{InsightError, Result};
use insightio_metrics::MetricStore;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::http_router::{self, AppState};
use crate::ingest::{event_queue, IngestService, IngestWorker, WorkerHandle};
use crate::interceptor::InterceptorChain;
use crate::metrics_service::MetricsService;

/// A fully wired InsightIO server.
pub struct Server {
    config: ServerConfig,
    validator: Arc<ApiKeyValidator>,
    state: AppState,
    worker: WorkerHandle,
}

impl Server {
    /// Builds every component and starts the ingestion worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`InsightError::Config`] if `config` does not validate.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(MetricStore::new(config.metrics_window()));
        let (sender, receiver) = event_queue(config.queue_capacity);
        let worker = IngestWorker::new(receiver, store.clone()).spawn();
        let validator = Arc::new(ApiKeyValidator::new(config.api_keys.iter().cloned()));

        info!(
            env = %config.env,
            window_secs = config.metrics_window_secs,
            queue_capacity = config.queue_capacity,
            api_keys = validator.len(),
            "Server configured"
        );

        let state = AppState {
            chain: InterceptorChain::standard(store.clone(), Some(validator.clone())),
            ingest: IngestService::new(sender),
            metrics: MetricsService::new(store.clone()),
            store,
        };

        Ok(Self {
            config,
            validator,
            state,
            worker,
        })
    }

    /// Changes how often metrics subscriptions push.
    pub fn with_subscription_interval(mut self, interval: Duration) -> Self {
        self.state.metrics = MetricsService::with_interval(self.state.store.clone(), interval);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<MetricStore> {
        self.state.store.clone()
    }

    /// The live key set; keys added or removed here apply to the next call.
    pub fn validator(&self) -> Arc<ApiKeyValidator> {
        self.validator.clone()
    }

    /// The axum router serving every route.
    pub fn router(&self) -> axum::Router {
        http_router::router(self.state.clone())
    }

    /// Binds `addr` and serves until Ctrl-C.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| InsightError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;

        self.serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// The ingestion worker is stopped once the listener closes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| InsightError::Transport(format!("Failed to get local addr: {}", e)))?;
        info!("InsightIO server listening on {}", local_addr);

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| InsightError::Transport(format!("Server error: {}", e)));

        self.shutdown().await;
        result
    }

    /// Stops the ingestion worker. Events still queued are never aggregated.
    pub async fn shutdown(self) {
        let processed = self.worker.shutdown().await;
        info!(processed, "InsightIO server stopped");
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_creation() {
        let server = Server::new(ServerConfig::new(["k"])).unwrap();
        assert_eq!(server.validator().len(), 1);
        assert_eq!(server.store().total_events(), 0);
        assert_eq!(server.config().queue_capacity, 1000);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_rejects_invalid_config() {
        let err = Server::new(ServerConfig::new(Vec::<String>::new())).unwrap_err();
        assert!(matches!(err, InsightError::Config(_)));
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let server = Server::new(ServerConfig::new(["k"])).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(server.serve(listener, async {
            let _ = stop_rx.await;
        }));
        stop_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server should stop once signalled")
            .unwrap()
            .unwrap();
    }
}
