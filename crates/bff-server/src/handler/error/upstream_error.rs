//! Downstream call error to HTTP error conversion.

use bff_upstream::ErrorKind as UpstreamErrorKind;

use super::http_error::{Error as HttpError, ErrorKind};

impl From<bff_upstream::Error> for HttpError<'static> {
    fn from(error: bff_upstream::Error) -> Self {
        let message = match error.kind {
            UpstreamErrorKind::Timeout => "A downstream service did not answer in time",
            UpstreamErrorKind::NetworkError => "A downstream service is unreachable",
            UpstreamErrorKind::UnexpectedStatus => "A downstream service returned an error",
            UpstreamErrorKind::InvalidResponse | UpstreamErrorKind::Serialization => {
                "A downstream service returned an unexpected response"
            }
            UpstreamErrorKind::InvalidRequest
            | UpstreamErrorKind::Configuration
            | UpstreamErrorKind::Cancelled
            | UpstreamErrorKind::Unknown => "A downstream service call failed",
        };

        let service = error
            .context
            .clone()
            .unwrap_or(std::borrow::Cow::Borrowed("upstream"));

        ErrorKind::BadGateway
            .with_message(message)
            .with_resource(service)
            .with_context(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn upstream_errors_are_bad_gateway_with_service_resource() {
        let error = bff_upstream::Error::timeout().with_context("progress");
        let http_error = HttpError::from(error);

        assert_eq!(http_error.kind(), ErrorKind::BadGateway);
        assert_eq!(http_error.kind().status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(http_error.resource(), Some("progress"));
        assert!(http_error.context().unwrap_or_default().contains("timeout"));
    }

    #[test]
    fn unnamed_service_falls_back() {
        let http_error = HttpError::from(bff_upstream::Error::network_error());
        assert_eq!(http_error.resource(), Some("upstream"));
    }
}
