//! Call Interceptors
//!
//! Every RPC passes through an ordered [`InterceptorChain`] before its
//! handler runs and after it finishes. The chain is composed once at server
//! construction; the standard one is instrumentation first, authentication
//! second:
//!
//! ```text
//! before:  Instrumentation ──► Auth ──► handler
//! after:   Instrumentation ◄── Auth ◄── handler
//! ```
//!
//! # Lifecycle
//!
//! 1. [`InterceptorChain::begin`] runs each interceptor's
//!    [`before`](Interceptor::before) in order. The first rejection
//!    short-circuits: the handler never runs, and the interceptors that had
//!    already accepted the call see [`CallOutcome::Rejected`].
//! 2. The handler runs. For streaming calls this is the whole stream.
//! 3. [`ActiveCall::finish`] runs every [`after`](Interceptor::after) in
//!    reverse order with [`CallOutcome::Completed`].
//!
//! An [`ActiveCall`] dropped without being finished (the client went away
//! mid-call) is completed as `cancelled`, so every call is observed exactly
//! once.
//!
//! # Example
//!
//! ```
//! use insightio_server::interceptor::{CallContext, InterceptorChain};
//! use insightio_metrics::MetricStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test_block(async {
//! let store = Arc::new(MetricStore::new(Duration::from_secs(60)));
//! let chain = InterceptorChain::standard(store.clone(), None);
//!
//! let reply = chain
//!     .unary(CallContext::new("/svc/Echo", Default::default()), || async { Ok::<_, insightio_common::Status>(7) })
//!     .await;
//!
//! assert_eq!(reply.unwrap(), 7);
//! assert_eq!(store.request_count("/svc/Echo"), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod auth;
mod instrument;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderMap;
use insightio_common::auth::ApiKeyValidator;
use insightio_common::Status;
use insightio_metrics::MetricStore;

pub use auth::AuthInterceptor;
pub use instrument::InstrumentationInterceptor;

/// What an interceptor knows about the call in flight.
#[derive(Debug, Clone)]
pub struct CallContext {
    method: String,
    headers: HeaderMap,
    started: Instant,
}

impl CallContext {
    /// Starts the clock on a call to `method`.
    ///
    /// # Arguments
    ///
    /// * `method` - Fully-qualified method name, e.g.
    ///   `/insightio.IngestService/SendEvent`
    /// * `headers` - Request metadata (carries `x-api-key`)
    pub fn new(method: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: method.into(),
            headers,
            started: Instant::now(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

/// How a call ended, as seen by [`Interceptor::after`].
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    /// A later interceptor refused the call; the handler never ran.
    Rejected(&'a Status),
    /// The handler ran to completion (or was cancelled).
    Completed {
        elapsed: Duration,
        result: Result<(), &'a Status>,
    },
}

/// A call-wrapping policy.
///
/// Both hooks have no-op defaults so a policy only implements the side it
/// cares about.
pub trait Interceptor: Send + Sync {
    /// Inspects a call before its handler runs. Returning an error rejects it.
    fn before(&self, _call: &mut CallContext) -> Result<(), Status> {
        Ok(())
    }

    /// Observes how a call this interceptor accepted ended.
    fn after(&self, _call: &CallContext, _outcome: &CallOutcome<'_>) {}
}

/// Ordered, cheaply clonable list of interceptors.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    /// The server's chain: instrumentation, then authentication if a
    /// validator is configured.
    pub fn standard(store: Arc<MetricStore>, validator: Option<Arc<ApiKeyValidator>>) -> Self {
        let mut interceptors: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(InstrumentationInterceptor::new(store))];
        if let Some(validator) = validator {
            interceptors.push(Arc::new(AuthInterceptor::new(validator)));
        }
        Self::new(interceptors)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs the `before` hooks.
    ///
    /// # Returns
    ///
    /// An [`ActiveCall`] to finish once the handler is done, or the status of
    /// the first interceptor that rejected the call.
    pub fn begin(&self, mut call: CallContext) -> Result<ActiveCall, Status> {
        for (idx, interceptor) in self.interceptors.iter().enumerate() {
            if let Err(status) = interceptor.before(&mut call) {
                let outcome = CallOutcome::Rejected(&status);
                for accepted in self.interceptors[..idx].iter().rev() {
                    accepted.after(&call, &outcome);
                }
                return Err(status);
            }
        }

        Ok(ActiveCall {
            chain: self.clone(),
            call,
            finished: false,
        })
    }

    /// Runs a unary handler inside the chain.
    ///
    /// The handler's result is returned unchanged.
    pub async fn unary<F, Fut, T>(&self, call: CallContext, handler: F) -> Result<T, Status>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let active = self.begin(call)?;
        let result = handler().await;
        active.finish(result.as_ref().map(|_| ()));
        result
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// A call that passed every `before` hook and awaits completion.
#[must_use = "an unfinished call is recorded as cancelled when dropped"]
#[derive(Debug)]
pub struct ActiveCall {
    chain: InterceptorChain,
    call: CallContext,
    finished: bool,
}

impl ActiveCall {
    pub fn context(&self) -> &CallContext {
        &self.call
    }

    /// Runs the `after` hooks in reverse order.
    pub fn finish(mut self, result: Result<(), &Status>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<(), &Status>) {
        self.finished = true;
        let outcome = CallOutcome::Completed {
            elapsed: self.call.started.elapsed(),
            result,
        };
        for interceptor in self.chain.interceptors.iter().rev() {
            interceptor.after(&self.call, &outcome);
        }
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        if !self.finished {
            let status = Status::cancelled("call dropped before completion");
            self.complete(Err(&status));
        }
    }
}
