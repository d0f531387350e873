//! Downstream response type and envelope decoding.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{Error, ErrorKind, Result};

/// Longest body excerpt carried in an error message.
const BODY_EXCERPT_LEN: usize = 256;

/// Envelope every downstream service wraps its answers in.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// `"success"` for a usable answer.
    pub status: String,
    /// Payload of a successful answer.
    pub data: Option<T>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error detail of a failed answer.
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Returns `true` when `status` is `success`, ignoring case.
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// What a downstream service answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Creates a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, body.to_string())
    }

    /// Returns `true` for 2xx statuses.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the body as lossy UTF-8, trimmed and cut to a short excerpt.
    pub fn body_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        match text.char_indices().nth(BODY_EXCERPT_LEN) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_owned(),
        }
    }

    /// Decodes the body as plain JSON, without status checks.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decodes the `data` of a success envelope.
    ///
    /// Fails on a 4xx/5xx status, on an empty body, on a body that is not an
    /// envelope, on a non-`success` envelope and on a missing `data` field.
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<T> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(Error::unexpected_status(self.status).with_message(format!(
                "service returned status {}: {}",
                self.status.as_u16(),
                self.body_excerpt()
            )));
        }

        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::new(ErrorKind::InvalidResponse).with_message("empty response body"));
        }

        let envelope: Envelope<T> = serde_json::from_slice(&self.body).map_err(|e| {
            Error::from_source(ErrorKind::InvalidResponse, e)
                .with_message(format!("undecodable envelope: {}", self.body_excerpt()))
        })?;

        if !envelope.is_success() {
            let detail = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| envelope.status.clone());
            return Err(Error::new(ErrorKind::InvalidResponse)
                .with_message(format!("service reported failure: {detail}")));
        }

        envelope
            .data
            .ok_or_else(|| Error::new(ErrorKind::InvalidResponse).with_message("envelope has no data"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Points {
        total_points: i64,
    }

    fn response(status: u16, body: &str) -> UpstreamResponse {
        UpstreamResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.to_owned(),
        )
    }

    #[test]
    fn success_envelope_yields_data() -> anyhow::Result<()> {
        let response = UpstreamResponse::json(
            StatusCode::OK,
            &json!({"status": "Success", "data": {"total_points": 42}}),
        );
        assert_eq!(response.envelope::<Points>()?, Points { total_points: 42 });
        Ok(())
    }

    #[test]
    fn error_status_is_rejected_with_excerpt() {
        let error = response(503, "  service unavailable  ")
            .envelope::<Points>()
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::UnexpectedStatus);
        assert_eq!(error.status, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            error.message.as_deref(),
            Some("service returned status 503: service unavailable")
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(300);
        let excerpt = response(500, &body).body_excerpt();
        assert_eq!(excerpt.len(), BODY_EXCERPT_LEN + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn empty_body_is_rejected() {
        let error = response(200, " \n").envelope::<Points>().unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidResponse);
    }

    #[test]
    fn failure_envelope_is_rejected() {
        let error = response(200, r#"{"status":"error","error":"user not found"}"#)
            .envelope::<Points>()
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidResponse);
        assert!(error.message.as_deref().unwrap_or_default().contains("user not found"));
    }

    #[test]
    fn non_envelope_body_is_rejected() {
        let error = response(200, "[1,2,3]").envelope::<Points>().unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidResponse);

        let error = response(200, r#"{"status":"success"}"#)
            .envelope::<Points>()
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidResponse);
    }
}
