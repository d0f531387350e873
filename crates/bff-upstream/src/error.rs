//! Structured error handling for downstream calls.

use std::borrow::Cow;

use http::StatusCode;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur when calling a downstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The request could not be built.
    InvalidRequest,
    /// Connection or transport failure.
    NetworkError,
    /// No response within the allotted time.
    Timeout,
    /// The service answered with a 4xx or 5xx status.
    UnexpectedStatus,
    /// The response body was empty or not a success envelope.
    InvalidResponse,
    /// A body could not be encoded or decoded.
    Serialization,
    /// The provider is misconfigured.
    Configuration,
    /// The call was abandoned before it finished.
    Cancelled,
    /// Unknown error occurred.
    #[default]
    Unknown,
}

impl ErrorKind {
    /// Check if this error kind is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }
}

/// Structured error type with classification and context tracking.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<Cow<'static, str>>,
    /// Status returned by the service, for [`ErrorKind::UnexpectedStatus`].
    pub status: Option<StatusCode>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
    /// Additional context information, usually the service name.
    pub context: Option<Cow<'static, str>>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            source: None,
            context: None,
        }
    }

    /// Creates a new error from a source error.
    pub fn from_source(kind: ErrorKind, source: impl Into<BoxedError>) -> Self {
        Self::new(kind).with_source(source)
    }

    /// Creates a transport error.
    pub fn network_error() -> Self {
        Self::new(ErrorKind::NetworkError)
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates an error for a 4xx/5xx answer.
    pub fn unexpected_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::new(ErrorKind::UnexpectedStatus)
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the source of the error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds context to the error.
    pub fn with_context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check if this error is retryable based on its kind.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization()
            .with_message(error.to_string())
            .with_source(error)
    }
}

impl From<http::Error> for Error {
    fn from(error: http::Error) -> Self {
        Self::from_source(ErrorKind::InvalidRequest, error).with_message("Invalid request parts")
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn builder_sets_fields() {
        let error = Error::new(ErrorKind::Configuration)
            .with_message("bad base url")
            .with_context("identity");

        assert_eq!(error.kind, ErrorKind::Configuration);
        assert_eq!(error.message.as_deref(), Some("bad base url"));
        assert_eq!(error.context.as_deref(), Some("identity"));
        assert!(error.source.is_none());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let error = Error::unexpected_status(StatusCode::BAD_GATEWAY).with_message("upstream down");
        let display = error.to_string();

        assert!(display.contains("unexpected_status"));
        assert!(display.contains("upstream down"));
        assert_eq!(error.status, Some(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());

        assert!(!ErrorKind::UnexpectedStatus.is_retryable());
        assert!(!ErrorKind::InvalidResponse.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn kind_from_str() {
        assert_eq!(ErrorKind::from_str("timeout").ok(), Some(ErrorKind::Timeout));
        assert_eq!(
            ErrorKind::from_str("invalid_response").ok(),
            Some(ErrorKind::InvalidResponse)
        );
        assert!(ErrorKind::from_str("nope").is_err());
        assert_eq!(ErrorKind::default(), ErrorKind::Unknown);
    }

    #[test]
    fn json_errors_become_serialization() {
        let json_error = serde_json::from_str::<u32>("x").unwrap_err();
        let error = Error::from(json_error);
        assert_eq!(error.kind, ErrorKind::Serialization);
        assert!(error.source.is_some());
    }
}
