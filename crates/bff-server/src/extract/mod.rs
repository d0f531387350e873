//! Request extractors.
//!
//! - [`AuthHeader`]: bearer token, verified by the token validator.
//! - [`AuthState`]: the admitted [`Identity`], after the session check.
//! - [`ClientInfo`]: user agent and client address, for session records.
//! - [`Json`]: `axum::Json` with rejections mapped to the error envelope.
//! - [`ValidateJson`]: [`Json`] followed by field validation.

mod auth;
mod client_info;
mod json;
mod validated_json;

pub use crate::extract::auth::{AuthHeader, AuthState, Identity};
pub use crate::extract::client_info::ClientInfo;
pub use crate::extract::json::Json;
pub use crate::extract::validated_json::ValidateJson;

/// Tracing target for the authentication gate.
pub const TRACING_TARGET_AUTHENTICATION: &str = "bff_server::extract::auth";
