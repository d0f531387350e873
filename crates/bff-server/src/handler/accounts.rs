//! Profile of the admitted account, served by the identity service.

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use bytes::Bytes;

use super::response::Relay;
use crate::extract::AuthState;
use crate::handler::Result;
use crate::service::{IdentityBackend, ServiceState};

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn get_own_profile(
    State(identity): State<IdentityBackend>,
    AuthState(caller): AuthState,
) -> Result<Relay> {
    Ok(identity.profile(&caller).await?.into())
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn update_own_profile(
    State(identity): State<IdentityBackend>,
    AuthState(caller): AuthState,
    body: Bytes,
) -> Result<Relay> {
    Ok(identity.update_profile(&caller, body).await?.into())
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new().route(
        "/api/v1/users/profile",
        get(get_own_profile).put(update_own_profile),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use bff_upstream::mock::MockUpstream;
    use serde_json::json;

    use crate::handler::test::TestApp;
    use crate::service::MockServices;

    #[tokio::test]
    async fn profile_is_fetched_with_identity_headers() -> anyhow::Result<()> {
        let identity = MockUpstream::new().with_data(
            Method::GET,
            "/api/v1/profile",
            json!({"display_name": "Ada"}),
        );
        let app = TestApp::new(MockServices {
            identity: identity.clone(),
            ..MockServices::default()
        })?;
        let (caller, token) = app.sign_in("ada@example.com").await?;

        let response = app
            .server
            .get("/api/v1/users/profile")
            .authorization_bearer(token)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["data"]["display_name"], "Ada");

        let call = &identity.calls()[0];
        assert_eq!(call.headers["x-user-id"], caller.user_id.to_string().as_str());
        assert_eq!(call.headers["x-user-email"], "ada@example.com");
        assert_eq!(call.headers["x-session-id"], caller.session_id.to_string().as_str());
        assert!(call.headers.get("authorization").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn profile_update_forwards_body() -> anyhow::Result<()> {
        let identity = MockUpstream::new().with_data(Method::PUT, "/api/v1/profile", json!({}));
        let app = TestApp::new(MockServices {
            identity: identity.clone(),
            ..MockServices::default()
        })?;
        let (_, token) = app.sign_in("ada@example.com").await?;

        app.server
            .put("/api/v1/users/profile")
            .authorization_bearer(token)
            .json(&json!({"display_name": "Ada L."}))
            .await
            .assert_status_ok();

        let call = &identity.calls()[0];
        assert_eq!(call.body.as_deref(), Some(&br#"{"display_name":"Ada L."}"#[..]));
        assert_eq!(call.headers["content-type"], "application/json");
        Ok(())
    }
}
