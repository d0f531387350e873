use serde::{Deserialize, Serialize};

use crate::service::{LessonStats, SessionStats, UserPoints, UserStreak};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Lifetime, weekly and monthly point totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub lifetime: i64,
    pub weekly: i64,
    pub monthly: i64,
}

/// Everything the home dashboard shows, from four downstream calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub lessons_completed: i64,
    pub lessons_in_progress: i64,
    pub study_sessions: i64,
    pub study_time_minutes: i64,
    pub study_time_formatted: String,
    pub total_points: PointsBreakdown,
    pub current_streak_days: i64,
    pub longest_streak_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_streak_activity: Option<String>,
}

impl DashboardSummary {
    pub fn new(
        sessions: SessionStats,
        lessons: LessonStats,
        points: UserPoints,
        streak: UserStreak,
    ) -> Self {
        Self {
            lessons_completed: lessons.completed,
            lessons_in_progress: lessons.in_progress,
            study_sessions: sessions.total_sessions,
            study_time_minutes: minutes_from_millis(sessions.total_duration_ms),
            study_time_formatted: format_study_duration(sessions.total_duration_ms),
            total_points: PointsBreakdown {
                lifetime: points.lifetime,
                weekly: points.weekly,
                monthly: points.monthly,
            },
            current_streak_days: streak.current_len,
            longest_streak_days: streak.longest_len,
            last_streak_activity: streak.last_day,
        }
    }
}

/// Whole minutes in `millis`, rounded down. Non-positive input gives zero.
pub fn minutes_from_millis(millis: i64) -> i64 {
    if millis <= 0 { 0 } else { millis / MILLIS_PER_MINUTE }
}

/// Formats a study duration as `"{h}h {m}m"`, or `"{m}m"` under an hour.
pub fn format_study_duration(millis: i64) -> String {
    let minutes = minutes_from_millis(millis);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
