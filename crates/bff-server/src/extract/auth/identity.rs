use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::AuthClaims;

/// Header carrying the admitted user id to downstream services.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
/// Header carrying the admitted user's email to downstream services.
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
/// Header carrying the admitted session id to downstream services.
pub const X_SESSION_ID: HeaderName = HeaderName::from_static("x-session-id");

/// Identity admitted by the authentication gate.
///
/// Only [`AuthState`](super::AuthState) constructs this from a request;
/// handlers receive it by value and never re-parse the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub session_id: Uuid,
}

impl Identity {
    /// Headers that propagate this identity to internal services.
    ///
    /// Downstream services trust these without re-validation, so they are
    /// only ever set by the gateway.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(X_USER_ID, uuid_header(self.user_id));
        headers.insert(X_SESSION_ID, uuid_header(self.session_id));
        // Emails with bytes outside visible ASCII cannot be sent as headers.
        if let Ok(email) = HeaderValue::from_str(&self.email) {
            headers.insert(X_USER_EMAIL, email);
        }
        headers
    }
}

impl From<AuthClaims> for Identity {
    fn from(claims: AuthClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            session_id: claims.session_id,
        }
    }
}

fn uuid_header(id: Uuid) -> HeaderValue {
    let mut buffer = Uuid::encode_buffer();
    let text = id.hyphenated().encode_lower(&mut buffer);
    HeaderValue::from_str(text).unwrap_or_else(|_| HeaderValue::from_static(""))
}
