//! HTTP Routes
//!
//! Maps every RPC method onto a `POST` route at its fully-qualified name and
//! wraps the handler in the [`InterceptorChain`]. Three routes sit outside
//! the chain:
//!
//! - `GET /__health`: liveness probe
//! - `GET /__metrics`: JSON [`StoreSnapshot`](insightio_metrics::StoreSnapshot)
//! - `POST /v1/event`: plain JSON gateway that transcodes a payload into an
//!   intercepted `SendEvent` call
//!
//! # Example
//!
//! ```no_run
//! use insightio_server::{Server, ServerConfig};
//!
//! # async fn demo() {
//! let server = Server::new(ServerConfig::new(["my-key"])).unwrap();
//! let app = server.router();
//! # let _ = app;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use insightio_common::auth::API_KEY_HEADER;
use insightio_common::protocol::methods;
use insightio_common::transport::{HttpTransport, LineDecoder, NdjsonCodec};
use insightio_common::{Event, GetMetricsRequest, IngestPayload, Status};
use insightio_metrics::MetricStore;

use crate::ingest::IngestService;
use crate::interceptor::{CallContext, InterceptorChain};
use crate::metrics_service::{EndpointStatsRequest, MetricsService};

/// Path of the plain JSON ingestion gateway.
pub const GATEWAY_PATH: &str = "/v1/event";

/// How long the gateway waits for the intercepted `SendEvent` call.
pub const GATEWAY_DEADLINE: Duration = Duration::from_millis(500);

/// Largest body the gateway accepts.
pub const GATEWAY_BODY_LIMIT: usize = 10 << 20;

/// Metrics buffered between a subscription task and its response body.
const SUBSCRIPTION_BUFFER: usize = 16;

/// Everything a route handler needs, cloned per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub chain: InterceptorChain,
    pub ingest: IngestService,
    pub metrics: MetricsService,
    pub store: Arc<MetricStore>,
}

/// Builds the application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(methods::SEND_EVENT, post(send_event))
        .route(methods::SEND_EVENT_STREAM, post(send_event_stream))
        .route(methods::GET_METRICS, post(get_metrics))
        .route(methods::SUBSCRIBE_METRICS, post(subscribe_metrics))
        .route(methods::GET_ENDPOINT_STATS, post(get_endpoint_stats))
        .route(
            GATEWAY_PATH,
            post(ingest_gateway).layer(DefaultBodyLimit::max(GATEWAY_BODY_LIMIT)),
        )
        .route("/__health", get(health_check))
        .route("/__metrics", get(store_snapshot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn respond<T: Serialize>(result: Result<T, Status>) -> Response {
    match result {
        Ok(message) => HttpTransport::json(StatusCode::OK, &message),
        Err(status) => HttpTransport::status(&status),
    }
}

async fn send_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let ingest = state.ingest;
    let call = CallContext::new(methods::SEND_EVENT, headers);
    respond(
        state
            .chain
            .unary(call, || async move {
                let event: Event = HttpTransport::parse(&body)?;
                ingest.send_event(event).await
            })
            .await,
    )
}

async fn send_event_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let active = match state.chain.begin(CallContext::new(methods::SEND_EVENT_STREAM, headers)) {
        Ok(active) => active,
        Err(status) => return status.into_response(),
    };

    let result = state.ingest.send_event_stream(decode_events(body)).await;
    active.finish(result.as_ref().map(|_| ()));
    respond(result)
}

/// Turns an NDJSON request body into a stream of events.
///
/// A line that is not a valid event yields `invalid_argument`; a failed body
/// read yields `cancelled`. Both end the stream.
fn decode_events(body: Body) -> impl Stream<Item = Result<Event, Status>> {
    futures::stream::unfold(
        (body.into_data_stream(), LineDecoder::new(), false),
        |(mut chunks, mut decoder, mut done)| async move {
            loop {
                let line = if done {
                    decoder.finish()?
                } else if let Some(line) = decoder.next_line() {
                    line
                } else {
                    match chunks.next().await {
                        Some(Ok(chunk)) => decoder.push(&chunk),
                        Some(Err(e)) => {
                            let status = Status::cancelled(format!("failed to read request body: {}", e));
                            return Some((Err(status), (chunks, LineDecoder::new(), true)));
                        }
                        None => done = true,
                    }
                    continue;
                };

                let event = NdjsonCodec::decode::<Event>(&line).map_err(Status::from);
                return Some((event, (chunks, decoder, done)));
            }
        },
    )
}

async fn get_metrics(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let metrics = state.metrics;
    let call = CallContext::new(methods::GET_METRICS, headers);
    respond(
        state
            .chain
            .unary(call, || async move {
                let request: GetMetricsRequest = HttpTransport::parse(&body)?;
                Ok(metrics.get_metrics(&request))
            })
            .await,
    )
}

async fn get_endpoint_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let metrics = state.metrics;
    let call = CallContext::new(methods::GET_ENDPOINT_STATS, headers);
    respond(
        state
            .chain
            .unary(call, || async move {
                let request: EndpointStatsRequest = HttpTransport::parse(&body)?;
                Ok(metrics.get_endpoint_stats(&request))
            })
            .await,
    )
}

/// Streams metrics as NDJSON until the client disconnects.
///
/// The call stays open for the whole subscription; the chain's `after` hooks
/// run when the subscription task ends.
async fn subscribe_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let active = match state.chain.begin(CallContext::new(methods::SUBSCRIBE_METRICS, headers)) {
        Ok(active) => active,
        Err(status) => return status.into_response(),
    };

    // The pushed set is fixed; the request is only checked for shape.
    if let Err(status) = HttpTransport::parse::<GetMetricsRequest>(&body) {
        active.finish(Err(&status));
        return status.into_response();
    }

    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
    let metrics = state.metrics;
    tokio::spawn(async move {
        let result = metrics.subscribe_metrics(tx).await;
        active.finish(result.as_ref().map(|_| ()));
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let metric = rx.recv().await?;
        Some((NdjsonCodec::encode(&metric), rx))
    });
    HttpTransport::ndjson(Body::from_stream(stream))
}

#[derive(Serialize)]
struct GatewayAccepted {
    status: &'static str,
    message: String,
}

/// `POST /v1/event`: accepts `{type, user_id?, metadata?, value?}`.
///
/// Errors are plain text. Anything that goes wrong past validation is
/// reported as 503 without detail.
async fn ingest_gateway(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload: IngestPayload = match body
        .map_err(|e| e.body_text())
        .and_then(|body| serde_json::from_slice(&body).map_err(|e| e.to_string()))
    {
        Ok(payload) => payload,
        Err(error) => {
            debug!(%error, "Gateway rejected payload");
            return (StatusCode::BAD_REQUEST, "Invalid JSON payload").into_response();
        }
    };

    if payload.event_type.is_empty() {
        return (StatusCode::BAD_REQUEST, "Field 'type' is required").into_response();
    }

    let Some(api_key) = headers.get(API_KEY_HEADER).filter(|v| !v.is_empty()).cloned() else {
        return (StatusCode::UNAUTHORIZED, format!("{} header missing", API_KEY_HEADER)).into_response();
    };

    let mut metadata = HeaderMap::new();
    metadata.insert(API_KEY_HEADER, api_key);

    let event = Event::from_payload(payload);
    let ingest = state.ingest;
    let call = state
        .chain
        .unary(CallContext::new(methods::SEND_EVENT, metadata), || async move {
            ingest.send_event(event).await
        });

    match tokio::time::timeout(GATEWAY_DEADLINE, call).await {
        Ok(Ok(ack)) if ack.ok => HttpTransport::json(
            StatusCode::ACCEPTED,
            &GatewayAccepted {
                status: "accepted",
                message: ack.message,
            },
        ),
        Ok(Ok(ack)) => {
            (StatusCode::BAD_REQUEST, format!("Ingestion rejected: {}", ack.message)).into_response()
        }
        Ok(Err(status)) => {
            warn!(error = %status, "Gateway SendEvent failed");
            backend_unavailable()
        }
        Err(_) => {
            warn!(deadline_ms = GATEWAY_DEADLINE.as_millis() as u64, "Gateway SendEvent timed out");
            backend_unavailable()
        }
    }
}

fn backend_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Backend service unavailable").into_response()
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn store_snapshot(State(state): State<AppState>) -> Response {
    HttpTransport::json(StatusCode::OK, &state.store.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{event_queue, EventReceiver, IngestWorker};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use insightio_common::auth::ApiKeyValidator;
    use insightio_common::{Ack, Code, MetricResponse};
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    struct TestApp {
        router: Router,
        store: Arc<MetricStore>,
        // Held so an undrained queue stays open
        _idle: Option<EventReceiver>,
    }

    fn app(queue_capacity: usize, with_worker: bool) -> TestApp {
        let store = Arc::new(MetricStore::new(Duration::from_secs(60)));
        let (tx, rx) = event_queue(queue_capacity);
        let idle = if with_worker {
            IngestWorker::new(rx, store.clone()).spawn();
            None
        } else {
            Some(rx)
        };
        let validator = Arc::new(ApiKeyValidator::new([KEY]));
        let state = AppState {
            chain: InterceptorChain::standard(store.clone(), Some(validator)),
            ingest: IngestService::new(tx),
            metrics: MetricsService::with_interval(store.clone(), Duration::from_millis(20)),
            store: store.clone(),
        };
        TestApp {
            router: router(state),
            store,
            _idle: idle,
        }
    }

    async fn wait_for_events(store: &MetricStore, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.total_events() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker should aggregate queued events");
    }

    fn rpc(path: &str, key: Option<&str>, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::post(path);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(body.into()).unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_send_event() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::SEND_EVENT, Some(KEY), r#"{"type":"page_view"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ack: Ack = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(ack.ok);

        assert_eq!(store.request_count(methods::SEND_EVENT), 1);
        assert_eq!(store.error_count(methods::SEND_EVENT), 0);
        wait_for_events(&store, 1).await;
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthenticated_and_counted() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::SEND_EVENT, None, r#"{"type":"page_view"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let status: Status = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(status.code, Code::Unauthenticated);
        assert_eq!(store.request_count(methods::SEND_EVENT), 1);
        assert_eq!(store.error_count(methods::SEND_EVENT), 1);
        assert_eq!(store.total_events(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_argument() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::SEND_EVENT, Some(KEY), "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.error_count(methods::SEND_EVENT), 1);
    }

    #[tokio::test]
    async fn test_event_stream_over_chunks() {
        let TestApp { router: app, store, .. } = app(8, true);
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok("{\"type\":\"a\"}\n{\"ty"),
            Ok("pe\":\"\"}\n\n{\"type\":\"b\"}"),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));
        let response = app
            .oneshot(rpc(methods::SEND_EVENT_STREAM, Some(KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ack: Ack = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(ack, Ack::accepted(crate::ingest::MSG_STREAM_RECEIVED));

        wait_for_events(&store, 2).await;
        assert_eq!(store.total_events(), 2);
        assert_eq!(store.request_count(methods::SEND_EVENT_STREAM), 1);
    }

    #[tokio::test]
    async fn test_event_stream_with_bad_line() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(
                methods::SEND_EVENT_STREAM,
                Some(KEY),
                "{\"type\":\"a\"}\nnot-json\n{\"type\":\"b\"}\n",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.error_count(methods::SEND_EVENT_STREAM), 1);
    }

    #[tokio::test]
    async fn test_get_metrics_with_empty_body() {
        let TestApp { router: app, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::GET_METRICS, Some(KEY), Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let metrics: MetricResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(metrics.metrics.len(), 4);
    }

    #[tokio::test]
    async fn test_subscribe_streams_ndjson() {
        let TestApp { router: app, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::SUBSCRIBE_METRICS, Some(KEY), "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            NdjsonCodec::CONTENT_TYPE
        );

        let mut body = response.into_body().into_data_stream();
        let mut decoder = LineDecoder::new();
        let mut names = Vec::new();
        while names.len() < 3 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
                .await
                .expect("subscription should push")
                .unwrap()
                .unwrap();
            decoder.push(&chunk);
            while let Some(line) = decoder.next_line() {
                let metric: insightio_common::Metric = NdjsonCodec::decode(&line).unwrap();
                names.push(metric.name);
            }
        }
        assert_eq!(names[..3], ["events_per_window", "total_throughput", "total_error_rate"]);
    }

    #[tokio::test]
    async fn test_subscribe_requires_key() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(methods::SUBSCRIBE_METRICS, Some("wrong"), "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.error_count(methods::SUBSCRIBE_METRICS), 1);
    }

    #[tokio::test]
    async fn test_gateway_accepts_event() {
        let TestApp { router: app, store, .. } = app(8, true);
        let response = app
            .oneshot(rpc(
                GATEWAY_PATH,
                Some(KEY),
                r#"{"type":"signup","user_id":"u1","metadata":{"plan":"pro"},"value":9.5}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["message"], crate::ingest::MSG_EVENT_RECEIVED);

        wait_for_events(&store, 1).await;
        assert_eq!(store.event_type_count("signup"), 1);
        assert_eq!(store.request_count(methods::SEND_EVENT), 1);
    }

    #[tokio::test]
    async fn test_gateway_validation_errors() {
        let cases = [
            ("not json", Some(KEY), StatusCode::BAD_REQUEST, "Invalid JSON payload"),
            (r#"{"user_id":"u1"}"#, Some(KEY), StatusCode::BAD_REQUEST, "Field 'type' is required"),
            (r#"{"type":"x"}"#, None, StatusCode::UNAUTHORIZED, "x-api-key header missing"),
            (r#"{"type":"x"}"#, Some("wrong"), StatusCode::SERVICE_UNAVAILABLE, "Backend service unavailable"),
        ];

        for (body, key, expected_status, expected_text) in cases {
            let TestApp { router: app, .. } = app(8, true);
            let response = app.oneshot(rpc(GATEWAY_PATH, key, body)).await.unwrap();
            assert_eq!(response.status(), expected_status, "body: {}", body);
            let text = body_bytes(response).await;
            assert_eq!(std::str::from_utf8(&text).unwrap().trim(), expected_text);
        }
    }

    #[tokio::test]
    async fn test_gateway_times_out_on_full_queue() {
        let TestApp { router: app, store, _idle } = app(1, false);
        let first = app
            .clone()
            .oneshot(rpc(GATEWAY_PATH, Some(KEY), r#"{"type":"a"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app
            .oneshot(rpc(GATEWAY_PATH, Some(KEY), r#"{"type":"b"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);

        // The abandoned call is still counted, as an error
        assert_eq!(store.request_count(methods::SEND_EVENT), 2);
        assert_eq!(store.error_count(methods::SEND_EVENT), 1);
    }

    #[tokio::test]
    async fn test_health_and_snapshot() {
        let TestApp { router: app, store, .. } = app(8, true);
        store.add_event("page_view");

        let health = app
            .clone()
            .oneshot(Request::get("/__health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(&body_bytes(health).await[..], b"OK");

        let snapshot = app
            .oneshot(Request::get("/__metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(snapshot).await).unwrap();
        assert_eq!(value["total_events"], 1);
        assert_eq!(value["event_types"]["page_view"], 1);
    }
}
