use std::sync::Arc;

use insightio_metrics::MetricStore;

use super::{CallContext, CallOutcome, Interceptor};

/// Records request count, error count and latency for every call.
///
/// Calls rejected by a later interceptor count as a request and an error
/// but are not timed, so they do not skew the latency histogram.
#[derive(Debug)]
pub struct InstrumentationInterceptor {
    store: Arc<MetricStore>,
}

impl InstrumentationInterceptor {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }
}

impl Interceptor for InstrumentationInterceptor {
    fn after(&self, call: &CallContext, outcome: &CallOutcome<'_>) {
        let method = call.method();
        match outcome {
            CallOutcome::Rejected(_) => {
                self.store.record_request(method);
                self.store.record_error(method);
            }
            CallOutcome::Completed { elapsed, result } => {
                self.store.record_request(method);
                self.store.record_latency(method, *elapsed);
                if result.is_err() {
                    self.store.record_error(method);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::InterceptorChain;
    use http::HeaderMap;
    use insightio_common::auth::{ApiKeyValidator, API_KEY_HEADER};
    use insightio_common::Status;
    use std::time::Duration;

    const METHOD: &str = "/insightio.IngestService/SendEvent";

    fn setup() -> (InterceptorChain, Arc<MetricStore>) {
        let store = Arc::new(MetricStore::new(Duration::from_secs(60)));
        let validator = Arc::new(ApiKeyValidator::new(["k"]));
        (InterceptorChain::standard(store.clone(), Some(validator)), store)
    }

    fn call(key: Option<&str>) -> CallContext {
        let mut headers = HeaderMap::new();
        if let Some(key) = key {
            headers.insert(API_KEY_HEADER, key.parse().unwrap());
        }
        CallContext::new(METHOD, headers)
    }

    #[tokio::test]
    async fn test_successful_call_is_counted_and_timed() {
        let (chain, store) = setup();
        chain
            .unary(call(Some("k")), || async {
                tokio::time::sleep(Duration::from_millis(15)).await;
                Ok::<_, Status>(())
            })
            .await
            .unwrap();

        assert_eq!(store.request_count(METHOD), 1);
        assert_eq!(store.error_count(METHOD), 0);
        let stats = store.latency_stats(METHOD);
        assert_eq!(stats.total_requests, 1);
        assert!(stats.min >= 15.0, "latency {} should cover the handler", stats.min);
    }

    #[tokio::test]
    async fn test_failed_call_is_counted_as_error() {
        let (chain, store) = setup();
        let _ = chain
            .unary(call(Some("k")), || async { Err::<(), _>(Status::internal("boom")) })
            .await;

        assert_eq!(store.request_count(METHOD), 1);
        assert_eq!(store.error_count(METHOD), 1);
        assert_eq!(store.latency_stats(METHOD).total_requests, 1);
        assert_eq!(store.total_error_rate(), 100.0);
    }

    #[tokio::test]
    async fn test_rejected_call_is_counted_but_not_timed() {
        let (chain, store) = setup();
        let status = chain
            .unary(call(Some("wrong")), || async { Ok::<_, Status>(()) })
            .await
            .unwrap_err();

        assert_eq!(status, Status::unauthenticated("API key is invalid"));
        assert_eq!(store.request_count(METHOD), 1);
        assert_eq!(store.error_count(METHOD), 1);
        assert_eq!(store.latency_stats(METHOD).total_requests, 0);
        assert!(store.top_slowest_endpoints(5).is_empty());
    }

    #[tokio::test]
    async fn test_every_call_counted_exactly_once() {
        let (chain, store) = setup();
        for i in 0..10 {
            let key = if i % 3 == 0 { None } else { Some("k") };
            let _ = chain
                .unary(call(key), || async move {
                    if i % 2 == 0 {
                        Ok(())
                    } else {
                        Err(Status::invalid_argument("odd"))
                    }
                })
                .await;
        }

        assert_eq!(store.request_count(METHOD), 10);
        // 4 rejected (0, 3, 6, 9), plus odd calls that reached the handler (1, 5, 7)
        assert_eq!(store.error_count(METHOD), 7);
        assert_eq!(store.latency_stats(METHOD).total_requests, 6);
    }
}
