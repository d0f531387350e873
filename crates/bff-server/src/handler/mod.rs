//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Public routes are health, registration, login, logout (which admits itself
//! through [`AuthState`]) and the content GraphQL endpoint. Every other route
//! sits behind [`require_authentication`]; listing users additionally
//! requires [`require_admin`].
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler
//! [`AuthState`]: crate::extract::AuthState
//! [`require_admin`]: crate::middleware::require_admin

mod accounts;
mod authentication;
mod content;
mod dashboard;
mod error;
mod monitors;
mod progress;
mod response;
mod sessions;
mod users;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::middleware::require_authentication;
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all private routes.
fn private_routes(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .merge(accounts::routes())
        .merge(sessions::routes())
        .merge(dashboard::routes())
        .merge(progress::routes())
        .merge(users::routes(state))
}

/// Returns a [`Router`] with all public routes.
fn public_routes() -> Router<ServiceState> {
    Router::new()
        .merge(authentication::routes())
        .merge(content::routes())
        .merge(monitors::routes())
}

/// Returns a [`Router`] with all routes.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    let require_authentication = from_fn_with_state(state.clone(), require_authentication);

    // Private routes with authentication middleware
    let private_router = private_routes(state).route_layer(require_authentication);

    Router::new()
        .merge(private_router)
        .merge(public_routes())
        .fallback(handler)
}
