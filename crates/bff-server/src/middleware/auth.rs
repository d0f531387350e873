//! Admission middleware for protected route groups.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::TRACING_TARGET_AUTH;
use crate::extract::AuthState;
use crate::handler::{ErrorKind, Result};
use crate::service::IdentityBackend;

/// Account roles allowed through [`require_admin`].
const ADMIN_ROLES: [&str; 2] = ["admin", "super-admin"];

/// Requires an admitted caller to proceed with the request.
///
/// #### Notes
///
/// - Extracting [`AuthState`] runs the whole gate: header, token and session.
/// - The admitted identity stays cached in the request extensions, so handlers
///   behind this layer extract it again for free.
pub async fn require_authentication(
    AuthState(_): AuthState,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

/// Requires the admitted caller to hold an administrator role.
///
/// The role is looked up live from the identity service on every request.
/// A caller without the role gets `403`; a failed lookup gets `502`.
pub async fn require_admin(
    State(identity): State<IdentityBackend>,
    AuthState(caller): AuthState,
    request: Request,
    next: Next,
) -> Result<Response> {
    let role = identity.role(&caller).await?;

    if !ADMIN_ROLES.contains(&role.as_str()) {
        tracing::warn!(
            target: TRACING_TARGET_AUTH,
            user_id = %caller.user_id,
            role = %role,
            "Unauthorized admin access attempt"
        );
        return Err(ErrorKind::Forbidden
            .with_message("Route requires administrator privileges")
            .with_resource("authorization"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{Method, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use bff_upstream::ErrorKind as UpstreamErrorKind;
    use bff_upstream::mock::MockUpstream;
    use serde_json::json;

    use super::*;
    use crate::extract::Identity;
    use crate::handler::test::TestApp;
    use crate::service::{MockServices, ServiceState};

    fn admin_only(state: ServiceState) -> Router<ServiceState> {
        Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(state, require_admin))
    }

    fn with_role(caller: &Identity, role: &str) -> MockUpstream {
        MockUpstream::new().with_data(
            Method::GET,
            &format!("/api/v1/users/{}", caller.user_id),
            json!({"id": caller.user_id, "role": role}),
        )
    }

    #[tokio::test]
    async fn admin_roles_pass() -> anyhow::Result<()> {
        for role in ADMIN_ROLES {
            let caller = TestApp::identity("root@example.com");
            let app = TestApp::with_router(
                MockServices {
                    identity: with_role(&caller, role),
                    ..MockServices::default()
                },
                admin_only,
            )?;
            let token = app.sign_in_as(&caller).await?;

            let response = app.server.get("/admin").authorization_bearer(&token).await;
            response.assert_status_ok();
            response.assert_text("ok");
        }
        Ok(())
    }

    #[tokio::test]
    async fn other_roles_are_forbidden() -> anyhow::Result<()> {
        let caller = TestApp::identity("ada@example.com");
        let app = TestApp::with_router(
            MockServices {
                identity: with_role(&caller, "learner"),
                ..MockServices::default()
            },
            admin_only,
        )?;
        let token = app.sign_in_as(&caller).await?;

        let response = app.server.get("/admin").authorization_bearer(&token).await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<serde_json::Value>()["name"], "forbidden");
        Ok(())
    }

    #[tokio::test]
    async fn failed_role_lookup_is_bad_gateway() -> anyhow::Result<()> {
        let caller = TestApp::identity("ada@example.com");
        let identity = MockUpstream::new().with_error(
            Method::GET,
            &format!("/api/v1/users/{}", caller.user_id),
            UpstreamErrorKind::NetworkError,
        );
        let app = TestApp::with_router(
            MockServices {
                identity,
                ..MockServices::default()
            },
            admin_only,
        )?;
        let token = app.sign_in_as(&caller).await?;

        app.server
            .get("/admin")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::BAD_GATEWAY);
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_caller_never_reaches_the_role_lookup() -> anyhow::Result<()> {
        let identity = MockUpstream::new();
        let app = TestApp::with_router(
            MockServices {
                identity: identity.clone(),
                ..MockServices::default()
            },
            admin_only,
        )?;

        app.server
            .get("/admin")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        assert!(identity.calls().is_empty());
        Ok(())
    }
}
