//! GraphQL catalog queries, forwarded to the content service.
//!
//! The route is public. A well-formed bearer credential is passed along so the
//! content service can personalize; anything else is dropped. Responses of the
//! catalog queries named by [`CachedOperation`] are served cache-aside from the
//! derived-data cache and refilled in the background.

use axum::Router;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::post;
use bff_nats::{CachedOperation, DerivedCache, QueryKey};
use bff_upstream::UpstreamResponse;
use serde_json::Value;

use super::response::Relay;
use crate::extract::ValidateJson;
use crate::handler::Result;
use crate::service::{ContentBackend, GraphQlRequest, ServiceState};
use crate::worker::BackgroundTasks;

/// Tracing target for content operations.
const TRACING_TARGET: &str = "bff_server::handler::content";

/// The `Authorization` header, if it carries a non-empty bearer token.
fn optional_bearer(headers: &HeaderMap) -> Option<&HeaderValue> {
    let value = headers.get(AUTHORIZATION)?;
    let token = value.to_str().ok()?.strip_prefix("Bearer ")?;
    (!token.trim().is_empty()).then_some(value)
}

/// A successful GraphQL response without an `errors` member.
fn cacheable_body(response: &UpstreamResponse) -> Option<Value> {
    if response.status != StatusCode::OK {
        return None;
    }
    let body = response.json_body::<Value>().ok()?;
    match body.get("errors") {
        None | Some(Value::Null) => Some(body),
        Some(_) => None,
    }
}

/// Cache key of the request, when its operation is cacheable.
fn cache_key(request: &GraphQlRequest) -> Option<QueryKey> {
    let operation: CachedOperation = request.cached_operation()?;
    match QueryKey::new(operation, request.variables.as_ref()) {
        Ok(key) => Some(key),
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                operation = %operation,
                error = %error,
                "Query key could not be built, bypassing the cache"
            );
            None
        }
    }
}

#[tracing::instrument(skip_all, fields(operation = request.query_name()))]
async fn graphql(
    State(content): State<ContentBackend>,
    State(cache): State<DerivedCache>,
    State(background): State<BackgroundTasks>,
    headers: HeaderMap,
    ValidateJson(request): ValidateJson<GraphQlRequest>,
) -> Result<Relay> {
    let request = request.normalized();
    let key = cache_key(&request);

    if let Some(key) = &key {
        match cache.read_query(key).await {
            Ok(Some(cached)) => {
                tracing::debug!(target: TRACING_TARGET, key = %key, "Query served from cache");
                return Ok(UpstreamResponse::json(StatusCode::OK, &cached).into());
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    key = %key,
                    error = %error,
                    "Derived cache read failed, using the live path"
                );
            }
        }
    }

    let response = content.graphql(optional_bearer(&headers), &request).await?;

    if let Some(key) = key
        && let Some(body) = cacheable_body(&response)
    {
        background.spawn("derived_cache.content_query", async move {
            cache.write_query(&key, &body).await
        });
    }

    Ok(response.into())
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/api/v1/content/graphql", post(graphql))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Method;
    use bff_upstream::ErrorKind as UpstreamErrorKind;
    use bff_upstream::mock::MockUpstream;
    use serde_json::json;

    use super::*;
    use crate::handler::test::TestApp;
    use crate::service::MockServices;

    const GRAPHQL_PATH: &str = "/graphql";
    const TOPICS: &str = "query GetTopics { topics { id name } }";

    fn topics_body() -> Value {
        json!({"data": {"topics": [{"id": "t1", "name": "Grammar"}]}})
    }

    fn scripted_content() -> MockUpstream {
        MockUpstream::new().with_response(
            Method::POST,
            GRAPHQL_PATH,
            UpstreamResponse::json(StatusCode::OK, &topics_body()),
        )
    }

    /// Waits for the background write of `key` to land.
    async fn cached(app: &TestApp, key: &QueryKey) -> Option<Value> {
        for _ in 0..50 {
            if let Ok(Some(body)) = app.state.derived_cache.read_query(key).await {
                return Some(body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[test]
    fn only_bearer_credentials_are_forwarded() {
        let mut headers = HeaderMap::new();
        assert!(optional_bearer(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(optional_bearer(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert!(optional_bearer(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(
            optional_bearer(&headers).map(HeaderValue::as_bytes),
            Some(&b"Bearer abc.def"[..])
        );
    }

    #[test]
    fn responses_with_errors_are_not_cacheable() {
        let ok = UpstreamResponse::json(StatusCode::OK, &topics_body());
        assert_eq!(cacheable_body(&ok), Some(topics_body()));

        let null_errors = json!({"data": {}, "errors": null});
        let ok = UpstreamResponse::json(StatusCode::OK, &null_errors);
        assert!(cacheable_body(&ok).is_some());

        let failed = json!({"data": null, "errors": [{"message": "boom"}]});
        let failed = UpstreamResponse::json(StatusCode::OK, &failed);
        assert!(cacheable_body(&failed).is_none());

        let teapot = UpstreamResponse::json(StatusCode::IM_A_TEAPOT, &topics_body());
        assert!(cacheable_body(&teapot).is_none());
    }

    #[tokio::test]
    async fn miss_forwards_and_fills_cache() -> anyhow::Result<()> {
        let content = scripted_content();
        let app = TestApp::new(MockServices {
            content: content.clone(),
            ..MockServices::default()
        })?;

        let response = app
            .server
            .post("/api/v1/content/graphql")
            .json(&json!({"query": TOPICS}))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), topics_body());
        assert_eq!(content.call_count(Method::POST, GRAPHQL_PATH), 1);
        assert!(content.calls()[0].headers.get("authorization").is_none());

        let key = QueryKey::new(CachedOperation::GetTopics, None)?;
        assert_eq!(cached(&app, &key).await, Some(topics_body()));
        Ok(())
    }

    #[tokio::test]
    async fn hit_is_served_without_upstream_call() -> anyhow::Result<()> {
        let content = scripted_content();
        let app = TestApp::new(MockServices {
            content: content.clone(),
            ..MockServices::default()
        })?;
        let variables = json!({"first": 10});
        let key = QueryKey::new(CachedOperation::GetTags, variables.as_object())?;
        let stored = json!({"data": {"tags": ["verbs"]}});
        app.state.derived_cache.write_query(&key, &stored).await?;

        let response = app
            .server
            .post("/api/v1/content/graphql")
            .json(&json!({
                "query": "query GetTags($first: Int) { tags(first: $first) }",
                "variables": variables,
            }))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), stored);
        assert!(content.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn different_variables_miss() -> anyhow::Result<()> {
        let content = scripted_content();
        let app = TestApp::new(MockServices {
            content: content.clone(),
            ..MockServices::default()
        })?;
        let cached_variables = json!({"first": 10});
        let key = QueryKey::new(CachedOperation::GetTopics, cached_variables.as_object())?;
        app.state
            .derived_cache
            .write_query(&key, &json!({"data": {"topics": []}}))
            .await?;

        app.server
            .post("/api/v1/content/graphql")
            .json(&json!({"query": TOPICS, "variables": {"first": 20}}))
            .await
            .assert_status_ok();

        assert_eq!(content.call_count(Method::POST, GRAPHQL_PATH), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cache_outage_falls_back_to_live_path() -> anyhow::Result<()> {
        let mocks = MockServices {
            content: scripted_content(),
            ..MockServices::default()
        };
        mocks.cache.set_unavailable(true);
        let app = TestApp::new(mocks)?;

        let response = app
            .server
            .post("/api/v1/content/graphql")
            .json(&json!({"query": TOPICS}))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), topics_body());
        assert_eq!(app.mocks.content.call_count(Method::POST, GRAPHQL_PATH), 1);
        Ok(())
    }

    #[tokio::test]
    async fn other_operations_are_never_cached() -> anyhow::Result<()> {
        let content = scripted_content();
        let app = TestApp::new(MockServices {
            content: content.clone(),
            ..MockServices::default()
        })?;
        let (_, token) = app.sign_in("ada@example.com").await?;

        for _ in 0..2 {
            app.server
                .post("/api/v1/content/graphql")
                .authorization_bearer(&token)
                .json(&json!({"query": "query GetLessons { lessons { id } }"}))
                .await
                .assert_status_ok();
        }

        assert_eq!(content.call_count(Method::POST, GRAPHQL_PATH), 2);
        assert_eq!(
            content.calls()[0].headers["authorization"],
            format!("Bearer {token}").as_str()
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(app.mocks.cache.len().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn blank_query_is_rejected() -> anyhow::Result<()> {
        let content = MockUpstream::new();
        let app = TestApp::new(MockServices {
            content: content.clone(),
            ..MockServices::default()
        })?;

        let response = app
            .server
            .post("/api/v1/content/graphql")
            .json(&json!({"query": "  "}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(content.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_content_service_is_bad_gateway() -> anyhow::Result<()> {
        let content = MockUpstream::new().with_error(
            Method::POST,
            GRAPHQL_PATH,
            UpstreamErrorKind::NetworkError,
        );
        let app = TestApp::new(MockServices {
            content,
            ..MockServices::default()
        })?;

        let response = app
            .server
            .post("/api/v1/content/graphql")
            .json(&json!({"query": TOPICS}))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        Ok(())
    }
}
