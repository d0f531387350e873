//! Token validation error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::service::TokenError;

impl From<TokenError> for HttpError<'static> {
    fn from(token_error: TokenError) -> Self {
        let kind = match token_error {
            TokenError::Malformed => ErrorKind::MalformedToken,
            TokenError::BadSignature => ErrorKind::BadSignature,
            TokenError::Expired => ErrorKind::ExpiredToken,
            TokenError::MissingClaim(_) => ErrorKind::MissingClaim,
        };

        kind.with_context(token_error.to_string())
    }
}
