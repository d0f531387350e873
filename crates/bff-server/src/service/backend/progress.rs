//! Lesson and progress service: points, streaks and daily activity.

use bff_upstream::{Result, UpstreamRequest, UpstreamResponse, UpstreamService};
use bytes::Bytes;
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use super::identity::json_request;
use crate::extract::Identity;

/// Point totals of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoints {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub lifetime: i64,
    #[serde(default)]
    pub weekly: i64,
    #[serde(default)]
    pub monthly: i64,
}

/// Streak summary of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub current_len: i64,
    #[serde(default)]
    pub longest_len: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_day: Option<String>,
}

/// Activity counters for one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    #[serde(rename = "activity_dt")]
    pub activity_date: String,
    #[serde(default)]
    pub lessons_completed: i64,
    #[serde(default)]
    pub quizzes_completed: i64,
    #[serde(default)]
    pub minutes: i64,
}

impl DailyActivity {
    /// Minimum study minutes for a day to count without lessons or quizzes.
    pub const MIN_MINUTES: i64 = 10;

    /// A day counts towards the streak with enough minutes, or any finished
    /// lesson or quiz.
    pub fn is_completed(&self) -> bool {
        self.minutes >= Self::MIN_MINUTES || self.lessons_completed > 0 || self.quizzes_completed > 0
    }
}

/// Daily counter a client may increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityField {
    LessonsCompleted,
    QuizzesCompleted,
    Minutes,
    Points,
}

/// Increment of one daily counter, accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DailyActivityIncrement {
    /// Day to credit; the progress service defaults to today.
    #[serde(rename = "activity_dt", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub activity_date: Option<String>,
    pub field: ActivityField,
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// Lesson totals of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonStats {
    #[serde(default)]
    pub total_started: i64,
    #[serde(default)]
    pub in_progress: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub abandoned: i64,
    #[serde(default)]
    pub completion_rate: f64,
    #[serde(default)]
    pub total_score: i64,
}

/// Handle over the lesson and progress service.
#[derive(Debug, Clone, Deref)]
pub struct ProgressBackend(UpstreamService);

impl ProgressBackend {
    /// Wraps an upstream service.
    pub fn new(service: UpstreamService) -> Self {
        Self(service)
    }

    fn points_request(user_id: &str) -> UpstreamRequest {
        UpstreamRequest::get(format!("/api/v1/progress/points/user/{user_id}"))
    }

    fn streak_request(user_id: &str) -> UpstreamRequest {
        UpstreamRequest::get(format!("/api/v1/progress/streaks/user/{user_id}"))
    }

    /// Points of any user, decoded.
    pub async fn points(&self, user_id: &str) -> Result<UserPoints> {
        self.fetch(Self::points_request(user_id)).await
    }

    /// Points of any user, undecoded.
    pub async fn points_raw(&self, user_id: &str) -> Result<UpstreamResponse> {
        self.call(Self::points_request(user_id)).await
    }

    /// Streak of any user, decoded.
    pub async fn streak(&self, user_id: &str) -> Result<UserStreak> {
        self.fetch(Self::streak_request(user_id)).await
    }

    /// Streak of any user, undecoded.
    pub async fn streak_raw(&self, user_id: &str) -> Result<UpstreamResponse> {
        self.call(Self::streak_request(user_id)).await
    }

    /// Live streak of the admitted user.
    pub async fn my_streak(&self, identity: &Identity) -> Result<UserStreak> {
        let request = UpstreamRequest::get("/api/v1/progress/streaks/user/me")
            .with_headers(identity.to_headers());
        self.fetch(request).await
    }

    /// Forwards a streak check; the body is optional.
    pub async fn check_my_streak(&self, identity: &Identity, body: Bytes) -> Result<UpstreamResponse> {
        let request = UpstreamRequest::post("/api/v1/progress/streaks/user/me/check")
            .with_headers(identity.to_headers());
        self.call(json_request(request, body)).await
    }

    /// Last seven days of activity of the admitted user.
    pub async fn week_activity(&self, identity: &Identity) -> Result<Vec<DailyActivity>> {
        let request = UpstreamRequest::get("/api/v1/progress/daily-activity/user/me/week")
            .with_headers(identity.to_headers());
        self.fetch(request).await
    }

    pub async fn increment_daily_activity(
        &self,
        identity: &Identity,
        increment: &DailyActivityIncrement,
    ) -> Result<UpstreamResponse> {
        let request = UpstreamRequest::post("/api/v1/progress/daily-activity/increment")
            .with_headers(identity.to_headers())
            .with_json(increment)?;
        self.call(request).await
    }

    pub async fn lesson_stats(&self, identity: &Identity) -> Result<LessonStats> {
        let request =
            UpstreamRequest::get("/api/v1/lessons/user/me/stats").with_headers(identity.to_headers());
        self.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(minutes: i64, lessons: i64, quizzes: i64) -> DailyActivity {
        DailyActivity {
            activity_date: "2026-10-12".to_owned(),
            lessons_completed: lessons,
            quizzes_completed: quizzes,
            minutes,
        }
    }

    #[test]
    fn completed_day_rules() {
        assert!(!day(0, 0, 0).is_completed());
        assert!(!day(9, 0, 0).is_completed());
        assert!(day(10, 0, 0).is_completed());
        assert!(day(0, 1, 0).is_completed());
        assert!(day(0, 0, 2).is_completed());
    }

    #[test]
    fn increment_validation() -> anyhow::Result<()> {
        let valid: DailyActivityIncrement = serde_json::from_value(serde_json::json!({
            "field": "minutes",
            "amount": 15
        }))?;
        assert!(valid.validate().is_ok());
        assert_eq!(valid.field, ActivityField::Minutes);
        assert_eq!(
            serde_json::to_value(&valid)?,
            serde_json::json!({"field": "minutes", "amount": 15})
        );

        let zero = DailyActivityIncrement { amount: 0, ..valid.clone() };
        assert!(zero.validate().is_err());

        let unknown_field = serde_json::from_value::<DailyActivityIncrement>(serde_json::json!({
            "field": "hours",
            "amount": 1
        }));
        assert!(unknown_field.is_err());
        Ok(())
    }

    #[test]
    fn activity_date_uses_wire_name() -> anyhow::Result<()> {
        let activity: DailyActivity = serde_json::from_value(serde_json::json!({
            "activity_dt": "2026-10-12",
            "minutes": 12
        }))?;

        assert_eq!(activity.activity_date, "2026-10-12");
        assert_eq!(activity.lessons_completed, 0);
        assert_eq!(serde_json::to_value(&activity)?["activity_dt"], "2026-10-12");
        Ok(())
    }
}
