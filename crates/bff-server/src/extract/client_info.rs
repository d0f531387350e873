//! Client metadata recorded with a new session.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

/// Proxy header listing the client address first.
const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// Single-address proxy header.
const X_REAL_IP: &str = "x-real-ip";

/// `User-Agent` and best-known client address of a request.
///
/// The address comes from `X-Forwarded-For` (first entry), then
/// `X-Real-IP`, then the socket peer when the server was started with
/// connect info. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: String,
    pub ip_addr: String,
}

impl ClientInfo {
    /// Reads client metadata from request headers and the optional peer address.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user_agent = header(USER_AGENT.as_str()).unwrap_or_default().to_owned();
        let ip_addr = header(X_FORWARDED_FOR)
            .and_then(|list| list.split(',').map(str::trim).find(|ip| !ip.is_empty()))
            .or_else(|| header(X_REAL_IP))
            .map(str::to_owned)
            .or_else(|| peer.map(|peer| peer.ip().to_string()))
            .unwrap_or_default();

        Self {
            user_agent,
            ip_addr,
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}
