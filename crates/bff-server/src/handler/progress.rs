//! Streak overview and the progress writes that invalidate it.
//!
//! The overview is served cache-aside from the derived-data cache. Every write
//! the gateway forwards successfully (a streak check or a daily-activity
//! increment) drops the caller's cached snapshots, so the next read is live.
//! A refill whose live read started before such a write is discarded.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use bff_nats::{CacheKind, DerivedCache, Generation};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::response::{Relay, StreakOverview, Success};
use crate::extract::{AuthState, Identity, ValidateJson};
use crate::handler::{Error, Result};
use crate::service::{
    Aggregator, DailyActivity, DailyActivityIncrement, ProgressBackend, ServiceState, SubTask,
    UserStreak,
};
use crate::worker::BackgroundTasks;

/// Tracing target for progress operations.
const TRACING_TARGET: &str = "bff_server::handler::progress";

enum StreakPart {
    Streak(UserStreak),
    Week(Vec<DailyActivity>),
}

/// Reads a snapshot; an unreachable or corrupt cache counts as a miss.
async fn read_cached<T>(cache: &DerivedCache, kind: CacheKind, user_id: Uuid) -> Option<T>
where
    T: DeserializeOwned,
{
    match cache.read(kind, user_id).await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                kind = %kind,
                user_id = %user_id,
                error = %error,
                "Derived cache read failed, using the live path"
            );
            None
        }
    }
}

/// Drops every snapshot of `user_id`. Failures are logged, never returned.
async fn invalidate_cached(cache: &DerivedCache, user_id: Uuid) {
    if let Err(error) = cache.invalidate_all(user_id).await {
        tracing::warn!(
            target: TRACING_TARGET,
            user_id = %user_id,
            error = %error,
            "Derived cache invalidation failed"
        );
    }
}

/// Loads the missing parts live, fail-fast, and refills the cache in the
/// background. `seen` is the caller's generation from before the live read.
async fn load_missing(
    progress: &ProgressBackend,
    aggregator: &Aggregator,
    (cache, seen): (&DerivedCache, Generation),
    background: &BackgroundTasks,
    caller: &Identity,
    (mut streak, mut week): (Option<UserStreak>, Option<Vec<DailyActivity>>),
) -> Result<(UserStreak, Vec<DailyActivity>)> {
    let mut tasks = Vec::with_capacity(2);
    if streak.is_none() {
        let (progress, caller) = (progress.clone(), caller.clone());
        tasks.push(SubTask::new("streak", async move {
            progress.my_streak(&caller).await.map(StreakPart::Streak)
        }));
    }
    if week.is_none() {
        let (progress, caller) = (progress.clone(), caller.clone());
        tasks.push(SubTask::new("week_activity", async move {
            progress.week_activity(&caller).await.map(StreakPart::Week)
        }));
    }

    let parts = aggregator
        .fail_fast(tasks)
        .await
        .map_err(|error| Error::from(error).with_message("Unable to load streak"))?;

    let user_id = caller.user_id;
    for part in parts {
        match part {
            StreakPart::Streak(live) => {
                let (cache, snapshot) = (cache.clone(), live.clone());
                background.spawn("derived_cache.streak", async move {
                    cache
                        .write_if_current(CacheKind::Streak, user_id, &snapshot, seen)
                        .await
                        .map(|_written| ())
                });
                streak = Some(live);
            }
            StreakPart::Week(live) => {
                let (cache, snapshot) = (cache.clone(), live.clone());
                background.spawn("derived_cache.week_activity", async move {
                    cache
                        .write_if_current(CacheKind::WeekActivity, user_id, &snapshot, seen)
                        .await
                        .map(|_written| ())
                });
                week = Some(live);
            }
        }
    }

    Ok((streak.unwrap_or_default(), week.unwrap_or_default()))
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn my_streak(
    State(progress): State<ProgressBackend>,
    State(aggregator): State<Aggregator>,
    State(cache): State<DerivedCache>,
    State(background): State<BackgroundTasks>,
    AuthState(caller): AuthState,
) -> Result<Success<StreakOverview>> {
    let user_id = caller.user_id;
    let seen = cache.generation(user_id).await;
    let cached = (
        read_cached::<UserStreak>(&cache, CacheKind::Streak, user_id).await,
        read_cached::<Vec<DailyActivity>>(&cache, CacheKind::WeekActivity, user_id).await,
    );

    let (streak, week) = match cached {
        (Some(streak), Some(week)) => {
            tracing::debug!(target: TRACING_TARGET, user_id = %user_id, "Streak served from cache");
            (streak, week)
        }
        partial => {
            let cache = (&cache, seen);
            load_missing(&progress, &aggregator, cache, &background, &caller, partial).await?
        }
    };

    Ok(Success::new(StreakOverview::new(&streak, &week)))
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn check_my_streak(
    State(progress): State<ProgressBackend>,
    State(cache): State<DerivedCache>,
    AuthState(caller): AuthState,
    body: Bytes,
) -> Result<Relay> {
    let response = progress.check_my_streak(&caller, body).await?;
    if response.is_success() {
        invalidate_cached(&cache, caller.user_id).await;
    }
    Ok(response.into())
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id, field = %increment.field))]
async fn increment_daily_activity(
    State(progress): State<ProgressBackend>,
    State(cache): State<DerivedCache>,
    AuthState(caller): AuthState,
    ValidateJson(increment): ValidateJson<DailyActivityIncrement>,
) -> Result<Relay> {
    let response = progress.increment_daily_activity(&caller, &increment).await?;
    if response.is_success() {
        invalidate_cached(&cache, caller.user_id).await;
    }
    Ok(response.into())
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/api/v1/progress/streaks/user/me", get(my_streak))
        .route("/api/v1/progress/streaks/user/me/check", post(check_my_streak))
        .route(
            "/api/v1/progress/daily-activity/increment",
            post(increment_daily_activity),
        )
}
