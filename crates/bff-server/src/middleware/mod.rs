//! Middleware for `axum::Router` and HTTP request processing.
//!
//! Admission lives in [`require_authentication`] and [`require_admin`], layered
//! per route group by the handlers. The router-wide stacks are applied by the
//! binary through the extension traits:
//!
//! ```rust,ignore
//! let app = routes(state.clone())
//!     .with_state(state)
//!     .with_security(&CorsConfig::default(), &SecurityHeadersConfig::default())
//!     .with_observability()
//!     .with_recovery(&RecoveryConfig::default());
//! ```

mod auth;
mod observability;
mod recovery;
mod security;

pub use auth::{require_admin, require_authentication};
pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{CorsConfig, RouterSecurityExt, SecurityHeadersConfig};

// Tracing target constants for consistent logging.
pub const TRACING_TARGET_AUTH: &str = "bff_server::middleware::auth";
