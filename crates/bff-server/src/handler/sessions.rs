//! Sessions of the admitted account.
//!
//! The identity service authenticates these calls with the caller's own bearer
//! token. Every revocation it confirms is mirrored into the session store, so
//! the revoked tokens stop being admitted on the very next request.

use std::collections::BTreeSet;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::{delete, get, post};
use bff_nats::SessionStore;
use bff_upstream::UpstreamResponse;
use serde_json::Value;
use uuid::Uuid;

use super::response::Relay;
use crate::extract::AuthState;
use crate::handler::{ErrorKind, Result};
use crate::service::{IdentityBackend, ServiceState};

/// Tracing target for session operations.
const TRACING_TARGET: &str = "bff_server::handler::sessions";

/// The caller's `Authorization` header, already verified by the gate.
fn authorization(headers: &HeaderMap) -> Result<HeaderValue> {
    headers.get(AUTHORIZATION).cloned().ok_or_else(|| {
        ErrorKind::MissingOrMalformedHeader
            .with_context("Missing Authorization header")
            .with_resource("authentication")
    })
}

/// Collects session ids from a session listing.
///
/// Accepts a bare array, a success envelope around one, or an object with a
/// `sessions` array. Entries name their id as `id` or `session_id`.
fn listed_session_ids(response: &UpstreamResponse) -> Vec<Uuid> {
    let Ok(body) = response.json_body::<Value>() else {
        return Vec::new();
    };

    let listing = body.get("data").unwrap_or(&body);
    let entries = match listing {
        Value::Array(entries) => entries,
        Value::Object(object) => match object.get("sessions") {
            Some(Value::Array(entries)) => entries,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(|entry| entry.get("id").or_else(|| entry.get("session_id")))
        .filter_map(Value::as_str)
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect()
}

#[tracing::instrument(skip_all)]
async fn list_sessions(
    State(identity): State<IdentityBackend>,
    AuthState(_): AuthState,
    headers: HeaderMap,
) -> Result<Relay> {
    let authorization = authorization(&headers)?;
    Ok(identity.sessions(&authorization).await?.into())
}

#[tracing::instrument(skip_all, fields(session_id = %session_id))]
async fn delete_session(
    State(identity): State<IdentityBackend>,
    State(session_store): State<SessionStore>,
    AuthState(caller): AuthState,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Relay> {
    let session_id = Uuid::parse_str(&session_id).map_err(|_| {
        ErrorKind::BadRequest
            .with_message("Session id must be a UUID")
            .with_resource("session")
    })?;

    let authorization = authorization(&headers)?;
    let response = identity.delete_session(&authorization, session_id).await?;

    if response.is_success() {
        session_store.delete(session_id).await?;
        tracing::info!(
            target: TRACING_TARGET,
            user_id = %caller.user_id,
            session_id = %session_id,
            "Session revoked"
        );
    }

    Ok(response.into())
}

#[tracing::instrument(skip_all, fields(user_id = %caller.user_id))]
async fn revoke_all_sessions(
    State(identity): State<IdentityBackend>,
    State(session_store): State<SessionStore>,
    AuthState(caller): AuthState,
    headers: HeaderMap,
) -> Result<Relay> {
    let authorization = authorization(&headers)?;

    // Listed before revoking: afterwards the identity service has nothing to list.
    let listing = identity.sessions(&authorization).await?;
    let mut session_ids: BTreeSet<Uuid> = if listing.is_success() {
        listed_session_ids(&listing).into_iter().collect()
    } else {
        tracing::warn!(
            target: TRACING_TARGET,
            status = listing.status.as_u16(),
            "Session listing failed, revoking the current session only"
        );
        BTreeSet::new()
    };

    let response = identity.revoke_all_sessions(&authorization).await?;
    if !response.is_success() {
        return Ok(response.into());
    }

    session_ids.insert(caller.session_id);
    let count = session_ids.len();
    session_store.delete_many(session_ids).await?;

    tracing::info!(
        target: TRACING_TARGET,
        user_id = %caller.user_id,
        count = count,
        "All sessions revoked"
    );

    Ok(response.into())
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/sessions/revoke-all", post(revoke_all_sessions))
        .route("/api/v1/sessions/{session_id}", delete(delete_session))
}
