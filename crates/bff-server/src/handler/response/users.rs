use serde::{Deserialize, Serialize};

use crate::service::{UserProfile, UserRecord};

/// An account with its point and streak totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithProgress {
    pub id: String,
    pub email: String,
    pub status: String,
    pub created_at: String,
    pub profile: UserProfile,
    pub points: i64,
    pub streak: i64,
}

impl UserWithProgress {
    pub fn new(user: UserRecord, points: i64, streak: i64) -> Self {
        Self {
            id: user.id,
            email: user.email,
            status: user.status,
            created_at: user.created_at,
            profile: user.profile.unwrap_or_default(),
            points,
            streak,
        }
    }
}

/// A page of accounts enriched with progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersWithProgress {
    pub users: Vec<UserWithProgress>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// One account with its raw point and streak payloads.
///
/// `points` and `streak` are `null` when the progress service could not
/// supply them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    pub user: serde_json::Value,
    pub points: serde_json::Value,
    pub streak: serde_json::Value,
}
