//! Accounts seen by other accounts, enriched with progress.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::Value;
use uuid::Uuid;

use super::response::{Relay, Success, UserDetail, UserWithProgress, UsersWithProgress};
use crate::extract::AuthState;
use crate::handler::{ErrorKind, Result};
use crate::middleware::require_admin;
use crate::service::{
    Aggregator, IdentityBackend, ListUsersQuery, ProgressBackend, ServiceState, SubTask, UserPage,
};

/// Tracing target for user operations.
const TRACING_TARGET: &str = "bff_server::handler::users";

/// Fetches one account, then its points and streak payloads best-effort.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id, target_id = %user_id))]
async fn get_user(
    State(identity): State<IdentityBackend>,
    State(progress): State<ProgressBackend>,
    State(aggregator): State<Aggregator>,
    AuthState(caller): AuthState,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let target = Uuid::parse_str(&user_id).map_err(|_| {
        ErrorKind::BadRequest
            .with_message("User id must be a UUID")
            .with_resource("user")
    })?;
    let target = target.to_string();

    let response = identity.user(&caller, &target).await?;
    if !response.is_success() {
        return Ok(Relay::from(response).into_response());
    }
    let user = response
        .json_body::<Value>()
        .ok()
        .and_then(|mut body| body.get_mut("data").map(Value::take))
        .unwrap_or_default();

    let tasks = vec![
        SubTask::new("points", {
            let (progress, target) = (progress.clone(), target.clone());
            async move { progress.points_raw(&target).await?.envelope::<Value>() }
        }),
        SubTask::new("streak", {
            let (progress, target) = (progress.clone(), target.clone());
            async move { progress.streak_raw(&target).await?.envelope::<Value>() }
        }),
    ];
    let mut parts = aggregator.best_effort(tasks).await.into_iter();
    let points = parts.next().unwrap_or_default();
    let streak = parts.next().unwrap_or_default();

    tracing::debug!(
        target: TRACING_TARGET,
        has_points = !points.is_null(),
        has_streak = !streak.is_null(),
        "User detail assembled"
    );

    let detail = UserDetail {
        user,
        points,
        streak,
    };
    Ok(Success::new(detail).into_response())
}

/// Lists accounts with lifetime points and current streak, defaulting to `0`.
#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn list_users(
    State(identity): State<IdentityBackend>,
    State(progress): State<ProgressBackend>,
    State(aggregator): State<Aggregator>,
    AuthState(caller): AuthState,
    Query(query): Query<ListUsersQuery>,
) -> Result<Response> {
    let response = identity.users(&caller, &query).await?;
    if !response.is_success() {
        return Ok(Relay::from(response).into_response());
    }
    let page: UserPage = response
        .envelope()
        .map_err(|error| error.with_context("identity"))?;

    let points_tasks = page
        .data
        .iter()
        .map(|user| {
            let (progress, id) = (progress.clone(), user.id.clone());
            SubTask::new("points", async move {
                progress.points(&id).await.map(|points| points.lifetime)
            })
        })
        .collect();
    let streak_tasks = page
        .data
        .iter()
        .map(|user| {
            let (progress, id) = (progress.clone(), user.id.clone());
            SubTask::new("streak", async move {
                progress.streak(&id).await.map(|streak| streak.current_len)
            })
        })
        .collect();

    let (points, streaks) = tokio::join!(
        aggregator.best_effort(points_tasks),
        aggregator.best_effort(streak_tasks),
    );

    tracing::debug!(
        target: TRACING_TARGET,
        users = page.data.len(),
        page = page.page,
        "User page enriched"
    );

    let users = page
        .data
        .into_iter()
        .zip(points.into_iter().zip(streaks))
        .map(|(user, (points, streak))| UserWithProgress::new(user, points, streak))
        .collect();

    let listing = UsersWithProgress {
        users,
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        total_pages: page.total_pages,
    };
    Ok(Success::new(listing).into_response())
}

/// Returns a [`Router`] with all related routes.
///
/// Listing accounts additionally requires an administrator role.
///
/// [`Router`]: axum::routing::Router
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    let admin_routes = Router::new()
        .route("/api/v1/users", get(list_users))
        .route_layer(from_fn_with_state(state, require_admin));

    Router::new()
        .route("/api/v1/users/{user_id}", get(get_user))
        .merge(admin_routes)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use bff_upstream::ErrorKind as UpstreamErrorKind;
    use bff_upstream::UpstreamResponse;
    use bff_upstream::mock::MockUpstream;
    use serde_json::json;

    use crate::extract::Identity;
    use crate::handler::test::TestApp;
    use crate::service::MockServices;

    const ADA: &str = "0195a1c4-5d1e-7000-8000-00000000000a";
    const BOB: &str = "0195a1c4-5d1e-7000-8000-00000000000b";

    fn admin(caller: &Identity) -> MockUpstream {
        MockUpstream::new()
            .with_data(
                Method::GET,
                &format!("/api/v1/users/{}", caller.user_id),
                json!({"id": caller.user_id, "role": "admin"}),
            )
            .with_data(
                Method::GET,
                "/api/v1/users",
                json!({
                    "data": [
                        {"id": ADA, "email": "ada@example.com", "status": "active",
                         "created_at": "2026-01-02T00:00:00Z",
                         "profile": {"display_name": "Ada"}},
                        {"id": BOB, "email": "bob@example.com", "status": "locked"},
                    ],
                    "page": 2,
                    "page_size": 2,
                    "total": 7,
                    "total_pages": 4,
                }),
            )
    }

    fn progress() -> MockUpstream {
        MockUpstream::new()
            .with_data(
                Method::GET,
                &format!("/api/v1/progress/points/user/{ADA}"),
                json!({"lifetime": 420, "weekly": 20}),
            )
            .with_data(
                Method::GET,
                &format!("/api/v1/progress/streaks/user/{ADA}"),
                json!({"current_len": 5, "longest_len": 9}),
            )
            .with_data(
                Method::GET,
                &format!("/api/v1/progress/points/user/{BOB}"),
                json!({"lifetime": 15}),
            )
            .with_error(
                Method::GET,
                &format!("/api/v1/progress/streaks/user/{BOB}"),
                UpstreamErrorKind::Timeout,
            )
    }

    #[tokio::test]
    async fn list_enriches_each_user_and_keeps_paging() -> anyhow::Result<()> {
        let caller = TestApp::identity("root@example.com");
        let identity = admin(&caller);
        let app = TestApp::new(MockServices {
            identity: identity.clone(),
            progress: progress(),
            ..MockServices::default()
        })?;
        let token = app.sign_in_as(&caller).await?;

        let response = app
            .server
            .get("/api/v1/users")
            .add_query_param("page", 2)
            .add_query_param("page_size", 2)
            .add_query_param("search", "  ")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();

        let data = &response.json::<serde_json::Value>()["data"];
        assert_eq!(data["page"], 2);
        assert_eq!(data["total"], 7);
        assert_eq!(data["total_pages"], 4);
        assert_eq!(data["users"][0]["id"], ADA);
        assert_eq!(data["users"][0]["points"], 420);
        assert_eq!(data["users"][0]["streak"], 5);
        assert_eq!(data["users"][0]["profile"]["display_name"], "Ada");
        assert_eq!(data["users"][1]["points"], 15);
        assert_eq!(data["users"][1]["streak"], 0);

        let listing = identity
            .calls()
            .into_iter()
            .find(|call| call.path == "/api/v1/users")
            .ok_or_else(|| anyhow::anyhow!("listing was not forwarded"))?;
        assert_eq!(listing.query.as_deref(), Some("page=2&page_size=2"));
        Ok(())
    }

    #[tokio::test]
    async fn list_requires_admin() -> anyhow::Result<()> {
        let caller = TestApp::identity("ada@example.com");
        let identity = MockUpstream::new().with_data(
            Method::GET,
            &format!("/api/v1/users/{}", caller.user_id),
            json!({"id": caller.user_id, "role": "learner"}),
        );
        let app = TestApp::new(MockServices {
            identity: identity.clone(),
            ..MockServices::default()
        })?;
        let token = app.sign_in_as(&caller).await?;

        app.server
            .get("/api/v1/users")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        assert_eq!(identity.call_count(Method::GET, "/api/v1/users"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn list_relays_downstream_refusal() -> anyhow::Result<()> {
        let caller = TestApp::identity("root@example.com");
        let identity = admin(&caller).with_response(
            Method::GET,
            "/api/v1/users",
            UpstreamResponse::json(
                StatusCode::UNPROCESSABLE_ENTITY,
                &json!({"status": "error", "message": "bad filter"}),
            ),
        );
        let app = TestApp::new(MockServices {
            identity,
            ..MockServices::default()
        })?;
        let token = app.sign_in_as(&caller).await?;

        let response = app
            .server
            .get("/api/v1/users")
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<serde_json::Value>()["message"], "bad filter");
        Ok(())
    }

    #[tokio::test]
    async fn detail_nulls_missing_progress() -> anyhow::Result<()> {
        let identity = MockUpstream::new().with_data(
            Method::GET,
            &format!("/api/v1/users/{BOB}"),
            json!({"id": BOB, "email": "bob@example.com"}),
        );
        let app = TestApp::new(MockServices {
            identity,
            progress: progress(),
            ..MockServices::default()
        })?;
        let (_, token) = app.sign_in("ada@example.com").await?;

        let response = app
            .server
            .get(&format!("/api/v1/users/{BOB}"))
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();

        let data = &response.json::<serde_json::Value>()["data"];
        assert_eq!(data["user"]["email"], "bob@example.com");
        assert_eq!(data["points"]["lifetime"], 15);
        assert!(data["streak"].is_null());
        Ok(())
    }

    #[tokio::test]
    async fn detail_relays_unknown_user() -> anyhow::Result<()> {
        let app = TestApp::new(MockServices::default())?;
        let (_, token) = app.sign_in("ada@example.com").await?;

        app.server
            .get(&format!("/api/v1/users/{ADA}"))
            .authorization_bearer(&token)
            .await
            .assert_status_not_found();
        Ok(())
    }

    #[tokio::test]
    async fn detail_rejects_non_uuid_ids() -> anyhow::Result<()> {
        let app = TestApp::new(MockServices::default())?;
        let (_, token) = app.sign_in("ada@example.com").await?;

        app.server
            .get("/api/v1/users/not-a-uuid")
            .authorization_bearer(&token)
            .await
            .assert_status_bad_request();
        Ok(())
    }
}
