//! Typed handles over the downstream services the gateway fronts.
//!
//! Each handle wraps an [`UpstreamService`] and knows the paths and payload
//! shapes of one service. Pass-through calls return the raw
//! [`UpstreamResponse`] for relaying; calls that feed an aggregation decode
//! the success envelope.
//!
//! [`UpstreamService`]: bff_upstream::UpstreamService
//! [`UpstreamResponse`]: bff_upstream::UpstreamResponse

mod content;
mod identity;
mod progress;

pub use content::{ContentBackend, GraphQlRequest};
pub use identity::{
    IdentityBackend, ListUsersQuery, LoginRequest, RegisterRequest, SessionStats, UserPage,
    UserProfile, UserRecord,
};
pub use progress::{
    ActivityField, DailyActivity, DailyActivityIncrement, LessonStats, ProgressBackend, UserPoints,
    UserStreak,
};

/// Tracing target for typed downstream calls.
pub const TRACING_TARGET_BACKEND: &str = "bff_server::service::backend";
