//! Admission extractor: valid token plus live, matching session.

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use bff_nats::SessionStore;
use derive_more::Deref;

use super::{AuthHeader, Identity};
use crate::extract::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{AuthClaims, TokenValidator};

/// Identity of an admitted request.
///
/// Extraction succeeds only when the bearer token verifies and the session it
/// names exists and belongs to the same user. The session store is consulted
/// on every request so that revocations apply immediately; the result is
/// cached only for the lifetime of the request.
#[derive(Debug, Clone, Deref, PartialEq, Eq)]
pub struct AuthState(pub Identity);

impl AuthState {
    /// Checks `claims` against the session store.
    ///
    /// A store failure counts as a missing session: without a session there is
    /// no admission.
    pub async fn from_verified_claims(
        claims: AuthClaims,
        session_store: &SessionStore,
    ) -> Result<Self> {
        let session = match session_store.get(claims.session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(
                    target: TRACING_TARGET_AUTHENTICATION,
                    session_id = %claims.session_id,
                    user_id = %claims.user_id,
                    "Request rejected: session not found or expired"
                );
                return Err(ErrorKind::SessionNotFoundOrExpired.with_resource("authentication"));
            }
            Err(store_error) => {
                tracing::warn!(
                    target: TRACING_TARGET_AUTHENTICATION,
                    session_id = %claims.session_id,
                    error = %store_error,
                    "Request rejected: session store unavailable"
                );
                return Err(ErrorKind::SessionNotFoundOrExpired
                    .with_context(format!("session lookup failed: {store_error}"))
                    .with_resource("authentication"));
            }
        };

        if session.user_id != claims.user_id {
            tracing::error!(
                target: TRACING_TARGET_AUTHENTICATION,
                session_id = %claims.session_id,
                token_user_id = %claims.user_id,
                session_user_id = %session.user_id,
                "Request rejected: session belongs to another user"
            );
            return Err(ErrorKind::SessionUserMismatch.with_resource("authentication"));
        }

        tracing::debug!(
            target: TRACING_TARGET_AUTHENTICATION,
            session_id = %claims.session_id,
            user_id = %claims.user_id,
            "Request admitted"
        );

        Ok(Self(Identity::from(claims)))
    }

    /// Returns the admitted identity.
    #[inline]
    pub fn into_identity(self) -> Identity {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthState
where
    S: Sync + Send + 'static,
    SessionStore: FromRef<S>,
    TokenValidator: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth_state) = parts.extensions.get::<Self>() {
            return Ok(auth_state.clone());
        }

        let auth_header = AuthHeader::from_request_parts(parts, state).await?;
        let session_store = SessionStore::from_ref(state);
        let auth_state =
            Self::from_verified_claims(auth_header.into_auth_claims(), &session_store).await?;

        parts.extensions.insert(auth_state.clone());
        Ok(auth_state)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthState
where
    S: Sync + Send + 'static,
    SessionStore: FromRef<S>,
    TokenValidator: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Self as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(auth_state) => Ok(Some(auth_state)),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bff_nats::SessionRecord;
    use bff_nats::kv::MemoryBackend;
    use jiff::Timestamp;
    use uuid::Uuid;

    use super::*;

    fn claims(user_id: Uuid, session_id: Uuid) -> AuthClaims {
        let expires_at = Timestamp::now()
            .checked_add(Duration::from_secs(3600))
            .unwrap();
        AuthClaims::new(user_id, "learner@example.com", session_id, expires_at)
    }

    fn store() -> (MemoryBackend, SessionStore) {
        let backend = MemoryBackend::new();
        (backend.clone(), SessionStore::new(Arc::new(backend)))
    }

    #[tokio::test]
    async fn matching_session_is_admitted() -> anyhow::Result<()> {
        let (_, sessions) = store();
        let (user_id, session_id) = (Uuid::new_v4(), Uuid::new_v4());
        sessions
            .put(session_id, &SessionRecord::new(user_id, "learner@example.com"), Duration::from_secs(60))
            .await?;

        let state = AuthState::from_verified_claims(claims(user_id, session_id), &sessions)
            .await?;

        assert_eq!(state.user_id, user_id);
        assert_eq!(state.session_id, session_id);
        Ok(())
    }

    #[tokio::test]
    async fn absent_session_is_rejected() {
        let (_, sessions) = store();
        let error = AuthState::from_verified_claims(claims(Uuid::new_v4(), Uuid::new_v4()), &sessions)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SessionNotFoundOrExpired);
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let (backend, sessions) = store();
        backend.set_unavailable(true);

        let error = AuthState::from_verified_claims(claims(Uuid::new_v4(), Uuid::new_v4()), &sessions)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SessionNotFoundOrExpired);
    }

    #[tokio::test]
    async fn session_of_another_user_is_rejected() -> anyhow::Result<()> {
        let (_, sessions) = store();
        let session_id = Uuid::new_v4();
        sessions
            .put(session_id, &SessionRecord::new(Uuid::new_v4(), "other@example.com"), Duration::from_secs(60))
            .await?;

        let error = AuthState::from_verified_claims(claims(Uuid::new_v4(), session_id), &sessions)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SessionUserMismatch);
        Ok(())
    }
}
