use serde::{Deserialize, Serialize};

use crate::service::{DailyActivity, UserStreak};

/// One day in the streak calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub date: String,
    pub completed: bool,
}

impl From<&DailyActivity> for ActivityDay {
    fn from(activity: &DailyActivity) -> Self {
        Self {
            date: activity.activity_date.clone(),
            completed: activity.is_completed(),
        }
    }
}

/// Streak lengths plus the week of activity behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakOverview {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub activity: Vec<ActivityDay>,
}

impl StreakOverview {
    pub fn new(streak: &UserStreak, week: &[DailyActivity]) -> Self {
        Self {
            current_streak: streak.current_len,
            longest_streak: streak.longest_len,
            activity: week.iter().map(ActivityDay::from).collect(),
        }
    }
}
