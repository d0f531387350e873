//! Token signing keys and bearer token validation.

mod auth_keys;
mod token_validator;

pub use auth_keys::{AuthKeys, AuthKeysConfig};
pub use token_validator::{AuthClaims, TokenError, TokenValidator};

/// Tracing target for token validation and key loading.
pub const TRACING_TARGET_SECURITY: &str = "bff_server::service::security";
