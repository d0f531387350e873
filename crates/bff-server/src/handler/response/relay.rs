use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING, UPGRADE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use bff_upstream::UpstreamResponse;

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// A downstream response passed through to the client.
///
/// Status, body and end-to-end headers are kept. Hop-by-hop headers are
/// dropped, and a non-empty body without a content type is labelled JSON.
#[derive(Debug, Clone)]
pub struct Relay(pub UpstreamResponse);

impl Relay {
    fn is_hop_by_hop(name: &HeaderName) -> bool {
        [&CONNECTION, &KEEP_ALIVE, &TRANSFER_ENCODING, &UPGRADE, &CONTENT_LENGTH].contains(&name)
    }
}

impl From<UpstreamResponse> for Relay {
    fn from(response: UpstreamResponse) -> Self {
        Self(response)
    }
}

impl IntoResponse for Relay {
    fn into_response(self) -> Response {
        let UpstreamResponse {
            status,
            headers,
            body,
        } = self.0;

        let is_empty = body.is_empty();
        let mut response = if is_empty {
            Response::new(Body::empty())
        } else {
            Response::new(Body::from(body))
        };
        *response.status_mut() = status;

        let response_headers = response.headers_mut();
        for (name, value) in &headers {
            if !Self::is_hop_by_hop(name) {
                response_headers.append(name.clone(), value.clone());
            }
        }

        if is_empty {
            response_headers.remove(CONTENT_TYPE);
        } else if !response_headers.contains_key(CONTENT_TYPE) {
            response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        response
    }
}
