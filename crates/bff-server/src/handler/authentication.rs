//! Registration, login and logout.
//!
//! The identity service issues tokens; the gateway records a session for
//! every token it sees issued, so that admission can be revoked centrally.

use axum::Router;
use axum::extract::State;
use axum::routing::post;
use bff_nats::{SessionRecord, SessionStore};
use bff_upstream::UpstreamResponse;
use serde::Deserialize;

use super::response::Relay;
use crate::extract::{AuthState, ClientInfo, ValidateJson};
use crate::handler::Result;
use crate::service::{IdentityBackend, LoginRequest, RegisterRequest, ServiceState, TokenValidator};

/// Tracing target for authentication operations.
const TRACING_TARGET: &str = "bff_server::handler::authentication";

#[derive(Debug, Default, Deserialize)]
struct IssuedToken {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    data: Option<IssuedToken>,
}

/// Returns the token issued in a successful login response, if any.
fn issued_token(response: &UpstreamResponse) -> Option<String> {
    let envelope: LoginEnvelope = response.json_body().ok()?;
    let issued = envelope.data?;
    issued
        .access_token
        .or(issued.token)
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

/// Stores a session for the token in a successful login response.
///
/// Nothing is stored when the response carries no usable token or the token
/// has no validity left.
async fn record_session(
    response: &UpstreamResponse,
    client_info: &ClientInfo,
    token_validator: &TokenValidator,
    session_store: &SessionStore,
) -> Result<()> {
    let Some(token) = issued_token(response) else {
        tracing::warn!(
            target: TRACING_TARGET,
            "Login succeeded without an access token, no session recorded"
        );
        return Ok(());
    };

    let claims = match token_validator.validate(&token) {
        Ok(claims) => claims,
        Err(token_error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                reason = token_error.as_ref(),
                "Issued token does not validate, no session recorded"
            );
            return Ok(());
        }
    };

    let Some(remaining) = claims.remaining_validity() else {
        return Ok(());
    };

    let record = SessionRecord::new(claims.user_id, &claims.email)
        .with_user_agent(&client_info.user_agent)
        .with_ip_addr(&client_info.ip_addr);
    // The store clamps to its bucket bound and warns when it does.
    session_store.put(claims.session_id, &record, remaining).await?;
    let ttl = session_store.clamp_ttl(remaining);

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %claims.user_id,
        session_id = %claims.session_id,
        ttl_secs = ttl.as_secs(),
        "Login successful: session recorded"
    );

    Ok(())
}

/// Forwards a registration to the identity service.
#[tracing::instrument(skip_all)]
async fn register(
    State(identity): State<IdentityBackend>,
    ValidateJson(request): ValidateJson<RegisterRequest>,
) -> Result<Relay> {
    let response = identity.register(&request).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        status = response.status.as_u16(),
        "Registration forwarded"
    );

    Ok(Relay::from(response))
}

/// Forwards credentials and records a session for the issued token.
#[tracing::instrument(skip_all)]
async fn login(
    State(identity): State<IdentityBackend>,
    State(token_validator): State<TokenValidator>,
    State(session_store): State<SessionStore>,
    client_info: ClientInfo,
    ValidateJson(request): ValidateJson<LoginRequest>,
) -> Result<Relay> {
    let response = identity.login(&request, &client_info).await?;

    if response.is_success() {
        record_session(&response, &client_info, &token_validator, &session_store).await?;
    } else {
        tracing::debug!(
            target: TRACING_TARGET,
            status = response.status.as_u16(),
            "Login refused by identity service"
        );
    }

    Ok(Relay::from(response))
}

/// Forwards a logout and removes the caller's session.
#[tracing::instrument(skip_all, fields(session_id = %auth_state.session_id))]
async fn logout(
    State(identity): State<IdentityBackend>,
    State(session_store): State<SessionStore>,
    auth_state: AuthState,
) -> Result<Relay> {
    let caller = auth_state.into_identity();
    let response = identity.logout(&caller).await?;

    // The local session goes regardless of what the identity service says.
    session_store.delete(caller.session_id).await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %caller.user_id,
        session_id = %caller.session_id,
        status = response.status.as_u16(),
        "Logout successful: session deleted"
    );

    Ok(Relay::from(response))
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::header::USER_AGENT;
    use axum::http::{HeaderValue, Method, StatusCode};
    use bff_nats::KvBackend;
    use bff_upstream::mock::MockUpstream;
    use jiff::Timestamp;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::handler::test::TestApp;
    use crate::service::{AuthClaims, MockServices, ServiceConfig};

    fn credentials() -> serde_json::Value {
        json!({"email": "learner@example.com", "password": "correct horse"})
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected_before_forwarding() -> anyhow::Result<()> {
        let app = TestApp::new(MockServices::default())?;

        let response = app
            .server
            .post("/api/v1/users/register")
            .json(&json!({"email": "nope", "name": "Ada", "password": "short"}))
            .await;

        response.assert_status_bad_request();
        assert!(app.mocks.identity.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn registration_is_relayed() -> anyhow::Result<()> {
        let identity = MockUpstream::new().with_response(
            Method::POST,
            "/api/v1/register",
            UpstreamResponse::json(StatusCode::CREATED, &json!({"status": "success", "data": {"id": "u1"}})),
        );
        let app = TestApp::new(MockServices {
            identity,
            ..MockServices::default()
        })?;

        let response = app
            .server
            .post("/api/v1/users/register")
            .json(&json!({"email": "ada@example.com", "name": "Ada", "password": "long enough"}))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<serde_json::Value>()["data"]["id"], "u1");
        Ok(())
    }

    #[tokio::test]
    async fn login_records_session_for_issued_token() -> anyhow::Result<()> {
        let (user_id, session_id) = (Uuid::new_v4(), Uuid::new_v4());
        let expires_at = Timestamp::now().checked_add(Duration::from_secs(600))?;
        let claims = AuthClaims::new(user_id, "learner@example.com", session_id, expires_at);
        let token = ServiceConfig::default().load_token_validator()?.sign(&claims)?;

        let identity = MockUpstream::new().with_data(
            Method::POST,
            "/api/v1/login",
            json!({"access_token": token}),
        );
        let app = TestApp::new(MockServices {
            identity,
            ..MockServices::default()
        })?;

        let response = app
            .server
            .post("/api/v1/users/login")
            .add_header(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"))
            .json(&credentials())
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["data"]["access_token"], token.as_str());

        let session = app.state.session_store.get(session_id).await?;
        let session = session.ok_or_else(|| anyhow::anyhow!("session was not recorded"))?;
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.user_agent, "Mozilla/5.0");
        Ok(())
    }

    #[tokio::test]
    async fn long_lived_token_gets_a_bounded_session() -> anyhow::Result<()> {
        let (user_id, session_id) = (Uuid::new_v4(), Uuid::new_v4());
        let ten_days = Duration::from_secs(10 * 86_400);
        let expires_at = Timestamp::now().checked_add(ten_days)?;
        let claims = AuthClaims::new(user_id, "learner@example.com", session_id, expires_at);
        let config = ServiceConfig::default();
        let token = config.load_token_validator()?.sign(&claims)?;

        let identity = MockUpstream::new().with_data(
            Method::POST,
            "/api/v1/login",
            json!({"token": token}),
        );
        let app = TestApp::new(MockServices {
            identity,
            ..MockServices::default()
        })?;

        app.server
            .post("/api/v1/users/login")
            .json(&credentials())
            .await
            .assert_status_ok();

        let stored = app
            .mocks
            .sessions
            .get(&session_id.to_string())
            .await?
            .ok_or_else(|| anyhow::anyhow!("session was not recorded"))?;
        let stored: serde_json::Value = serde_json::from_slice(&stored)?;
        let session_expiry: Timestamp = serde_json::from_value(stored["expires_at"].clone())?;

        let bound = Timestamp::now().checked_add(config.auth_keys.token_lifetime())?;
        assert!(session_expiry <= bound);
        assert!(session_expiry < expires_at);
        Ok(())
    }

    #[tokio::test]
    async fn refused_login_records_nothing() -> anyhow::Result<()> {
        let identity = MockUpstream::new().with_response(
            Method::POST,
            "/api/v1/login",
            UpstreamResponse::json(
                StatusCode::UNAUTHORIZED,
                &json!({"status": "error", "error": "invalid credentials"}),
            ),
        );
        let mocks = MockServices {
            identity,
            ..MockServices::default()
        };
        let app = TestApp::new(mocks.clone())?;

        let response = app.server.post("/api/v1/users/login").json(&credentials()).await;

        response.assert_status_unauthorized();
        assert_eq!(response.json::<serde_json::Value>()["error"], "invalid credentials");
        assert!(mocks.sessions.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn logout_deletes_session_even_if_upstream_fails() -> anyhow::Result<()> {
        let mocks = MockServices::default();
        let app = TestApp::new(mocks.clone())?;
        let (caller, token) = app.sign_in("learner@example.com").await?;

        let response = app
            .server
            .post("/api/v1/users/logout")
            .authorization_bearer(&token)
            .await;

        // Unscripted route: the identity service answers 404.
        response.assert_status_not_found();
        assert!(!app.state.session_store.exists(caller.session_id).await?);
        assert_eq!(mocks.identity.call_count(Method::POST, "/api/v1/logout"), 1);

        let response = app
            .server
            .get("/api/v1/users/profile")
            .authorization_bearer(&token)
            .await;
        response.assert_status_unauthorized();
        Ok(())
    }
}
