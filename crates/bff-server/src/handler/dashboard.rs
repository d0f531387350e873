//! Home dashboard: four required metrics joined fail-fast.

use axum::Router;
use axum::extract::State;
use axum::routing::get;

use super::response::{DashboardSummary, Success};
use crate::extract::AuthState;
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{
    Aggregator, IdentityBackend, LessonStats, ProgressBackend, ServiceState, SessionStats,
    SubTask, UserPoints, UserStreak,
};

/// Tracing target for dashboard operations.
const TRACING_TARGET: &str = "bff_server::handler::dashboard";

enum DashboardPart {
    Sessions(SessionStats),
    Lessons(LessonStats),
    Points(UserPoints),
    Streak(UserStreak),
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn dashboard_summary(
    State(identity): State<IdentityBackend>,
    State(progress): State<ProgressBackend>,
    State(aggregator): State<Aggregator>,
    AuthState(caller): AuthState,
) -> Result<Success<DashboardSummary>> {
    let user_id = caller.user_id.to_string();

    let tasks = vec![
        SubTask::new("session_stats", {
            let (identity, caller) = (identity.clone(), caller.clone());
            async move { identity.session_stats(&caller).await.map(DashboardPart::Sessions) }
        }),
        SubTask::new("lesson_stats", {
            let (progress, caller) = (progress.clone(), caller.clone());
            async move { progress.lesson_stats(&caller).await.map(DashboardPart::Lessons) }
        }),
        SubTask::new("points", {
            let progress = progress.clone();
            async move { progress.points(&user_id).await.map(DashboardPart::Points) }
        }),
        SubTask::new("streak", {
            let (progress, caller) = (progress.clone(), caller.clone());
            async move { progress.my_streak(&caller).await.map(DashboardPart::Streak) }
        }),
    ];

    let parts = aggregator
        .fail_fast(tasks)
        .await
        .map_err(|error| Error::from(error).with_message("Unable to build dashboard summary"))?;

    let (mut sessions, mut lessons, mut points, mut streak) = (None, None, None, None);
    for part in parts {
        match part {
            DashboardPart::Sessions(value) => sessions = Some(value),
            DashboardPart::Lessons(value) => lessons = Some(value),
            DashboardPart::Points(value) => points = Some(value),
            DashboardPart::Streak(value) => streak = Some(value),
        }
    }

    let (Some(sessions), Some(lessons), Some(points), Some(streak)) =
        (sessions, lessons, points, streak)
    else {
        return Err(ErrorKind::InternalServerError
            .with_context("dashboard aggregation returned incomplete results")
            .with_resource("dashboard"));
    };

    tracing::debug!(
        target: TRACING_TARGET,
        user_id = %caller.user_id,
        "Dashboard summary assembled"
    );

    Ok(Success::new(DashboardSummary::new(sessions, lessons, points, streak)))
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/api/v1/dashboard/summary", get(dashboard_summary))
}
