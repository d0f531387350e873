use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Uniform error envelope returned to clients.
///
/// `name` is the machine-readable reason code; `message` is safe to show to
/// an end user. `context` is logged but never serialized.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse<'a> {
    /// The error name/type identifier
    pub name: Cow<'a, str>,
    /// User-friendly error message safe for client display
    pub message: Cow<'a, str>,
    /// The resource that the error relates to (optional, set by handler)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Cow<'a, str>>,

    /// Internal context for debugging (not exposed to client)
    #[serde(skip)]
    pub context: Option<Cow<'a, str>>,
    /// HTTP status code (not serialized in JSON)
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    // 4xx Client Errors
    pub const BAD_REQUEST: Self = Self::new(
        "bad_request",
        "Invalid request data.",
        StatusCode::BAD_REQUEST,
    );
    pub const FORBIDDEN: Self = Self::new("forbidden", "Access denied.", StatusCode::FORBIDDEN);
    pub const NOT_FOUND: Self =
        Self::new("not_found", "Resource not found.", StatusCode::NOT_FOUND);

    // Admission Errors
    pub const MISSING_OR_MALFORMED_HEADER: Self = Self::new(
        "missing_or_malformed_header",
        "Missing or malformed authorization header.",
        StatusCode::UNAUTHORIZED,
    );
    pub const MALFORMED_TOKEN: Self = Self::new(
        "malformed",
        "Malformed auth token.",
        StatusCode::UNAUTHORIZED,
    );
    pub const BAD_SIGNATURE: Self = Self::new(
        "bad_signature",
        "Auth token signature is invalid.",
        StatusCode::UNAUTHORIZED,
    );
    pub const EXPIRED_TOKEN: Self =
        Self::new("expired", "Auth token expired.", StatusCode::UNAUTHORIZED);
    pub const MISSING_CLAIM: Self = Self::new(
        "missing_claim",
        "Auth token is missing a required claim.",
        StatusCode::UNAUTHORIZED,
    );
    pub const SESSION_NOT_FOUND_OR_EXPIRED: Self = Self::new(
        "session_not_found_or_expired",
        "Session not found or expired.",
        StatusCode::UNAUTHORIZED,
    );
    pub const SESSION_USER_MISMATCH: Self = Self::new(
        "session_user_mismatch",
        "Session does not belong to this user.",
        StatusCode::UNAUTHORIZED,
    );

    // 5xx Server Errors
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "internal_server_error",
        "Internal server error.",
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    pub const BAD_GATEWAY: Self = Self::new(
        "bad_gateway",
        "Downstream service failed.",
        StatusCode::BAD_GATEWAY,
    );
    pub const SERVICE_UNAVAILABLE: Self = Self::new(
        "service_unavailable",
        "Service unavailable.",
        StatusCode::SERVICE_UNAVAILABLE,
    );
    pub const GATEWAY_TIMEOUT: Self = Self::new(
        "gateway_timeout",
        "Request timed out.",
        StatusCode::GATEWAY_TIMEOUT,
    );
    pub const DEADLINE_EXCEEDED: Self = Self::new(
        "deadline_exceeded",
        "Downstream services did not answer in time.",
        StatusCode::GATEWAY_TIMEOUT,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(name: &'a str, message: &'a str, status: StatusCode) -> Self {
        Self {
            name: Cow::Borrowed(name),
            message: Cow::Borrowed(message),
            resource: None,
            context: None,
            status,
        }
    }

    /// Merges a resource into the existing one with a `/` separator.
    pub fn with_resource(mut self, resource: impl Into<Cow<'a, str>>) -> Self {
        let new_resource = resource.into();
        self.resource = Some(match self.resource {
            Some(existing) => Cow::Owned(format!("{}/{}", existing, new_resource)),
            None => new_resource,
        });
        self
    }

    /// Appends the new message to the existing message.
    pub fn with_message(mut self, message: impl Into<Cow<'a, str>>) -> Self {
        let new_message = message.into();
        let base = self.message.trim_end_matches('.');
        self.message = Cow::Owned(format!("{}. {}", base, new_message));
        self
    }

    /// Merges context into the existing context with a `; ` separator.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let new_context = context.into();
        self.context = Some(match self.context {
            Some(existing) => Cow::Owned(format!("{}; {}", existing, new_context)),
            None => new_context,
        });
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(
                status = %self.status,
                name = %self.name,
                message = %self.message,
                resource = ?self.resource,
                context = ?self.context,
                "HTTP error response"
            );
        } else {
            tracing::debug!(
                status = %self.status,
                name = %self.name,
                resource = ?self.resource,
                context = ?self.context,
                "HTTP error response"
            );
        }
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_merging_resource() {
        let response = ErrorResponse::BAD_GATEWAY
            .with_resource("progress")
            .with_resource("streak");

        assert_eq!(response.resource.as_deref(), Some("progress/streak"));
    }

    #[test]
    fn error_response_merging_message() {
        let response = ErrorResponse::BAD_REQUEST
            .with_message("Invalid format")
            .with_message("Missing required field");

        assert_eq!(
            &response.message,
            "Invalid request data. Invalid format. Missing required field"
        );
    }

    #[test]
    fn error_response_merging_context() {
        let response = ErrorResponse::INTERNAL_SERVER_ERROR
            .with_context("session store unreachable")
            .with_context("login aborted");

        assert_eq!(
            response.context.as_deref(),
            Some("session store unreachable; login aborted")
        );
    }

    #[test]
    fn context_and_status_are_not_serialized() -> anyhow::Result<()> {
        let response = ErrorResponse::SESSION_USER_MISMATCH
            .with_resource("session")
            .with_context("owner differs");

        let json = serde_json::to_value(&response)?;

        assert_eq!(json["name"], "session_user_mismatch");
        assert_eq!(json["resource"], "session");
        assert!(json.get("context").is_none());
        assert!(json.get("status").is_none());
        Ok(())
    }

    #[test]
    fn admission_errors_are_unauthorized() {
        for response in [
            ErrorResponse::MISSING_OR_MALFORMED_HEADER,
            ErrorResponse::MALFORMED_TOKEN,
            ErrorResponse::BAD_SIGNATURE,
            ErrorResponse::EXPIRED_TOKEN,
            ErrorResponse::MISSING_CLAIM,
            ErrorResponse::SESSION_NOT_FOUND_OR_EXPIRED,
            ErrorResponse::SESSION_USER_MISMATCH,
        ] {
            assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        }
    }
}
