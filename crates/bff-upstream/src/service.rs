//! Named, cloneable handle over an [`UpstreamProvider`].

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::{Result, TRACING_TARGET, UpstreamProvider, UpstreamRequest, UpstreamResponse};

/// Downstream service wrapper for dependency injection.
///
/// Cheap to clone; every call is timed and logged under the service name.
#[derive(Clone)]
pub struct UpstreamService {
    name: Cow<'static, str>,
    inner: Arc<dyn UpstreamProvider>,
}

impl fmt::Debug for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamService")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl UpstreamService {
    /// Create a new service wrapper.
    pub fn new<P>(name: impl Into<Cow<'static, str>>, provider: P) -> Self
    where
        P: UpstreamProvider + 'static,
    {
        Self {
            name: name.into(),
            inner: Arc::new(provider),
        }
    }

    /// Returns the service name used in logs and errors.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Issues `request`, returning the raw response.
    pub async fn call(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let started_at = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();

        let result = self.inner.call(request).await;
        let elapsed = started_at.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    service = %self.name,
                    method = %method,
                    path = %path,
                    status = response.status.as_u16(),
                    elapsed_ms = elapsed.as_millis(),
                    "Downstream call completed"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    service = %self.name,
                    method = %method,
                    path = %path,
                    error = %error,
                    retryable = error.is_retryable(),
                    elapsed_ms = elapsed.as_millis(),
                    "Downstream call failed"
                );
            }
        }

        result.map_err(|error| match error.context {
            Some(_) => error,
            None => error.with_context(self.name.clone()),
        })
    }

    /// Issues `request` and decodes the success envelope's `data`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: UpstreamRequest) -> Result<T> {
        self.call(request)
            .await?
            .envelope()
            .map_err(|error| error.with_context(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;
    use crate::mock::MockUpstream;

    #[tokio::test]
    async fn fetch_decodes_envelope() -> anyhow::Result<()> {
        let mock = MockUpstream::new().with_data(
            Method::GET,
            "/api/v1/points/user/me",
            json!({"total_points": 7}),
        );
        let service = UpstreamService::new("progress", mock.clone());

        let data: serde_json::Value = service.fetch(UpstreamRequest::get("/api/v1/points/user/me")).await?;

        assert_eq!(data["total_points"], 7);
        assert_eq!(mock.call_count(Method::GET, "/api/v1/points/user/me"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn errors_carry_service_name() {
        let mock = MockUpstream::new().with_response(
            Method::GET,
            "/api/v1/users/profile",
            UpstreamResponse::json(StatusCode::INTERNAL_SERVER_ERROR, &json!({"error": "boom"})),
        );
        let service = UpstreamService::new("identity", mock);

        let error = service
            .fetch::<serde_json::Value>(UpstreamRequest::get("/api/v1/users/profile"))
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::UnexpectedStatus);
        assert_eq!(error.context.as_deref(), Some("identity"));
    }
}
