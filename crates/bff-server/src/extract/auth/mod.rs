//! Bearer token extraction and session verification.
//!
//! Admission runs in two steps, each cached in the request extensions:
//!
//! 1. [`AuthHeader`] parses `Authorization: Bearer <token>` and validates the
//!    token.
//! 2. [`AuthState`] loads the session named by the token and checks that it
//!    belongs to the token's user.

mod auth_header;
mod auth_state;
mod identity;

pub use self::auth_header::AuthHeader;
pub use self::auth_state::AuthState;
pub use self::identity::Identity;
