//! Reqwest-based HTTP client bound to one downstream service.

use std::sync::Arc;

use reqwest::Client;
use url::Url;

use super::{Error, ReqwestConfig, TRACING_TARGET};
use crate::{UpstreamProvider, UpstreamRequest, UpstreamResponse, UpstreamService};

struct ReqwestClientInner {
    http: Client,
    base_url: Url,
    config: ReqwestConfig,
}

/// HTTP provider that resolves request paths against a base URL.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, config: ReqwestConfig) -> crate::Result<Self> {
        let base_url = Url::parse(base_url).map_err(Error::from)?;
        let timeout = config.effective_timeout();

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.effective_user_agent())
            .build()
            .map_err(Error::from)?;

        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %base_url,
            timeout_ms = timeout.as_millis(),
            "Created reqwest client"
        );

        Ok(Self {
            inner: Arc::new(ReqwestClientInner {
                http,
                base_url,
                config,
            }),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolves `request`'s path and query against the base URL.
    pub fn resolve(&self, request: &UpstreamRequest) -> crate::Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{}", request.path_and_query())).map_err(Error::from)?;
        Ok(url)
    }

    /// Converts this client into a named [`UpstreamService`].
    pub fn into_service(self, name: &'static str) -> UpstreamService {
        UpstreamService::new(name, self)
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for ReqwestClient {
    async fn call(&self, request: UpstreamRequest) -> crate::Result<UpstreamResponse> {
        let url = self.resolve(&request)?;

        tracing::trace!(
            target: TRACING_TARGET,
            method = %request.method,
            url = %url,
            "Sending downstream request"
        );

        let mut http_request = self
            .inner
            .http
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            http_request = http_request.body(body);
        }

        let http_response = http_request.send().await.map_err(Error::from)?;
        let status = http_response.status();
        let headers = http_response.headers().clone();
        let body = http_response.bytes().await.map_err(Error::from)?;

        Ok(UpstreamResponse::new(status, headers, body))
    }
}
