//! Bearer token extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use derive_more::Deref;

use crate::extract::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{AuthClaims, TokenValidator};

/// Claims from a well-formed, correctly signed and unexpired bearer token.
///
/// This does not check the session; use [`AuthState`](super::AuthState) for
/// admission.
#[derive(Debug, Clone, Deref, PartialEq, Eq)]
pub struct AuthHeader(AuthClaims);

impl AuthHeader {
    /// Validates a raw token (without the `Bearer ` prefix).
    pub fn from_token(token: &str, validator: &TokenValidator) -> Result<Self> {
        validator
            .validate(token)
            .map(Self)
            .map_err(|token_error| Error::from(token_error).with_resource("authentication"))
    }

    /// Consumes this header and returns the verified claims.
    #[inline]
    pub fn into_auth_claims(self) -> AuthClaims {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthHeader
where
    S: Sync + Send,
    TokenValidator: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts.extensions.get::<Self>() {
            return Ok(auth_header.clone());
        }

        type AuthBearerHeader = TypedHeader<Authorization<Bearer>>;
        let bearer_header = match AuthBearerHeader::from_request_parts(parts, state).await {
            Ok(bearer_header) => bearer_header,
            Err(rejection) => {
                let context = match rejection.reason() {
                    TypedHeaderRejectionReason::Missing => "Missing Authorization header",
                    TypedHeaderRejectionReason::Error(_) => {
                        "Authorization header is not of the form `Bearer <token>`"
                    }
                    _ => "Unreadable Authorization header",
                };

                tracing::debug!(
                    target: TRACING_TARGET_AUTHENTICATION,
                    reason = context,
                    "Request rejected: no usable bearer token"
                );

                return Err(ErrorKind::MissingOrMalformedHeader
                    .with_context(context)
                    .with_resource("authentication"));
            }
        };

        let token = bearer_header.token().trim();
        if token.is_empty() {
            return Err(ErrorKind::MissingOrMalformedHeader
                .with_context("Empty bearer token")
                .with_resource("authentication"));
        }

        let validator = TokenValidator::from_ref(state);
        let auth_header = Self::from_token(token, &validator)?;

        parts.extensions.insert(auth_header.clone());
        Ok(auth_header)
    }
}
