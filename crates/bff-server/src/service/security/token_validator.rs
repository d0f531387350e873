//! Bearer token verification.

use std::time::Duration;

use jiff::Timestamp;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, IntoStaticStr};
use uuid::Uuid;

use super::{AuthKeys, TRACING_TARGET_SECURITY};

/// Why a bearer token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[derive(AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TokenError {
    /// Not a three-part signed token, or its segments do not decode.
    #[error("token is not a well-formed signed token")]
    Malformed,
    /// Signature does not verify, or the header names another algorithm.
    #[error("token signature does not verify")]
    BadSignature,
    /// The embedded expiry is now or in the past.
    #[error("token has expired")]
    Expired,
    /// The named claim is absent or of the wrong shape.
    #[error("token claim `{0}` is absent or malformed")]
    MissingClaim(&'static str),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => Self::BadSignature,
            JwtErrorKind::ExpiredSignature => Self::Expired,
            JwtErrorKind::MissingRequiredClaim(_) => Self::MissingClaim("exp"),
            _ => Self::Malformed,
        }
    }
}

/// Verified identity carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: Uuid,
    pub email: String,
    pub session_id: Uuid,
    #[serde(rename = "exp", with = "jiff::fmt::serde::timestamp::second::required")]
    pub expires_at: Timestamp,
}

impl AuthClaims {
    /// Creates claims expiring at `expires_at`.
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        session_id: Uuid,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            session_id,
            expires_at,
        }
    }

    /// Returns `true` once the current time reaches the expiry.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }

    /// Time left before expiry, or `None` if none is left.
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let remaining = self.expires_at.duration_since(Timestamp::now());
        Duration::try_from(remaining)
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }

    fn from_map(claims: &Map<String, Value>) -> Result<Self, TokenError> {
        let user_id = uuid_claim(claims, "user_id")?;
        let session_id = uuid_claim(claims, "session_id")?;

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or(TokenError::MissingClaim("email"))?;

        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| Timestamp::from_second(exp).ok())
            .ok_or(TokenError::MissingClaim("exp"))?;

        Ok(Self::new(user_id, email, session_id, expires_at))
    }
}

fn uuid_claim(claims: &Map<String, Value>, name: &'static str) -> Result<Uuid, TokenError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(TokenError::MissingClaim(name))
}

/// HS256 token validator. Pure: no I/O, no clock other than `now`.
#[derive(Clone)]
pub struct TokenValidator {
    keys: AuthKeys,
    validation: Validation,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Creates a validator over the shared secret.
    pub fn new(keys: AuthKeys) -> Self {
        // Claims, including expiry, are checked by hand so that each failure
        // has its own error kind.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self { keys, validation }
    }

    /// Returns the keys this validator verifies against.
    #[inline]
    pub fn keys(&self) -> &AuthKeys {
        &self.keys
    }

    /// Verifies `token` (without the `Bearer ` prefix) and extracts its claims.
    pub fn validate(&self, token: &str) -> Result<AuthClaims, TokenError> {
        let token_data = decode::<Map<String, Value>>(token, self.keys.decoding_key(), &self.validation)
            .map_err(|error| {
                let token_error = TokenError::from(error);
                tracing::debug!(
                    target: TRACING_TARGET_SECURITY,
                    reason = token_error.as_ref(),
                    "Token rejected"
                );
                token_error
            })?;

        let claims = AuthClaims::from_map(&token_data.claims)?;
        if claims.is_expired() {
            tracing::debug!(
                target: TRACING_TARGET_SECURITY,
                session_id = %claims.session_id,
                expired_at = %claims.expires_at,
                "Token rejected: expired"
            );
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Signs `claims` with the shared secret.
    pub fn sign(&self, claims: &AuthClaims) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, self.keys.encoding_key())
    }
}
