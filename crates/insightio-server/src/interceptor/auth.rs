use std::sync::Arc;

use insightio_common::auth::{extract_api_key, ApiKeyValidator};
use insightio_common::Status;
use tracing::debug;

use super::{CallContext, Interceptor};

/// Rejects calls that do not carry an accepted `x-api-key` header.
#[derive(Debug)]
pub struct AuthInterceptor {
    validator: Arc<ApiKeyValidator>,
}

impl AuthInterceptor {
    pub fn new(validator: Arc<ApiKeyValidator>) -> Self {
        Self { validator }
    }
}

impl Interceptor for AuthInterceptor {
    fn before(&self, call: &mut CallContext) -> Result<(), Status> {
        self.validator
            .validate(extract_api_key(call.headers()))
            .map_err(|err| {
                debug!(method = call.method(), error = %err, "Rejected unauthenticated call");
                Status::from(err)
            })
    }
}
