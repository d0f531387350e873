//! Scripted in-process provider.
//!
//! Routes are matched on method and path (query ignored). Unscripted routes
//! answer `404` with an empty body. Every call is recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};

use crate::{
    Error, ErrorKind, Result, UpstreamProvider, UpstreamRequest, UpstreamResponse,
    UpstreamService,
};

#[derive(Debug, Clone)]
enum Outcome {
    Respond(UpstreamResponse),
    Fail(ErrorKind),
}

#[derive(Debug, Clone)]
struct Route {
    outcome: Outcome,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<(Method, String), Route>,
    calls: Vec<UpstreamRequest>,
}

/// Scripted [`UpstreamProvider`] for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    state: Arc<Mutex<MockState>>,
}

impl MockUpstream {
    /// Creates a provider with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, method: Method, path: &str, outcome: Outcome) {
        let mut state = self.state();
        let delay = state
            .routes
            .get(&(method.clone(), path.to_owned()))
            .and_then(|route| route.delay);
        state
            .routes
            .insert((method, path.to_owned()), Route { outcome, delay });
    }

    /// Answers `method path` with `response`.
    #[must_use]
    pub fn with_response(self, method: Method, path: &str, response: UpstreamResponse) -> Self {
        self.route(method, path, Outcome::Respond(response));
        self
    }

    /// Answers `method path` with `200` and a success envelope around `data`.
    #[must_use]
    pub fn with_data(self, method: Method, path: &str, data: serde_json::Value) -> Self {
        let body = serde_json::json!({ "status": "success", "data": data });
        self.with_response(method, path, UpstreamResponse::json(StatusCode::OK, &body))
    }

    /// Fails `method path` with an error of `kind`.
    #[must_use]
    pub fn with_error(self, method: Method, path: &str, kind: ErrorKind) -> Self {
        self.route(method, path, Outcome::Fail(kind));
        self
    }

    /// Delays the answer for `method path` by `delay`.
    #[must_use]
    pub fn with_delay(self, method: Method, path: &str, delay: Duration) -> Self {
        let mut state = self.state();
        let key = (method, path.to_owned());
        match state.routes.get_mut(&key) {
            Some(route) => route.delay = Some(delay),
            None => {
                let outcome = Outcome::Respond(UpstreamResponse::new(
                    StatusCode::NOT_FOUND,
                    HeaderMap::new(),
                    "",
                ));
                state.routes.insert(key, Route {
                    outcome,
                    delay: Some(delay),
                });
            }
        }
        drop(state);
        self
    }

    /// Returns every request received so far.
    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.state().calls.clone()
    }

    /// Returns how many requests matched `method path`.
    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    /// Wraps this provider into a named service.
    pub fn into_service(self, name: &'static str) -> UpstreamService {
        UpstreamService::new(name, self)
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for MockUpstream {
    async fn call(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let route = {
            let mut state = self.state();
            let route = state
                .routes
                .get(&(request.method.clone(), request.path.clone()))
                .cloned();
            state.calls.push(request);
            route
        };

        let Some(route) = route else {
            return Ok(UpstreamResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), ""));
        };

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        match route.outcome {
            Outcome::Respond(response) => Ok(response),
            Outcome::Fail(kind) => Err(Error::new(kind).with_message("scripted failure")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_route_is_not_found() -> anyhow::Result<()> {
        let mock = MockUpstream::new();
        let response = mock.call(UpstreamRequest::get("/missing")).await?;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(mock.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn scripted_error_and_delay() {
        let mock = MockUpstream::new()
            .with_error(Method::POST, "/slow", ErrorKind::Timeout)
            .with_delay(Method::POST, "/slow", Duration::from_millis(10));

        let error = mock.call(UpstreamRequest::post("/slow")).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert_eq!(mock.call_count(Method::POST, "/slow"), 1);
    }

    #[tokio::test]
    async fn query_does_not_affect_matching() -> anyhow::Result<()> {
        let mock = MockUpstream::new().with_data(Method::GET, "/api/v1/users", serde_json::json!([]));
        let response = mock
            .call(UpstreamRequest::get("/api/v1/users").with_raw_query("page=1"))
            .await?;

        assert!(response.is_success());
        assert_eq!(mock.calls()[0].query.as_deref(), Some("page=1"));
        Ok(())
    }
}
