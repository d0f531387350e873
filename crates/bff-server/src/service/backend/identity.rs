//! Identity service: accounts, sessions and profiles.

use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::{HeaderName, HeaderValue};
use bff_upstream::{Result, UpstreamRequest, UpstreamResponse, UpstreamService};
use bytes::Bytes;
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::TRACING_TARGET_BACKEND;
use crate::extract::{ClientInfo, Identity};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Registration payload accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Login payload accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_code: Option<String>,
}

/// Study-session totals for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub total_duration_ms: i64,
}

/// Public profile fields of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One account as listed by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

/// A page of accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    #[serde(default)]
    pub data: Vec<UserRecord>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub total_pages: i64,
}

/// Filters for listing accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "ListUsersQuery::default_page")]
    pub page: u32,
    #[serde(default = "ListUsersQuery::default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            page: Self::default_page(),
            page_size: Self::default_page_size(),
            status: None,
            search: None,
        }
    }
}

impl ListUsersQuery {
    fn default_page() -> u32 {
        1
    }

    fn default_page_size() -> u32 {
        20
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        let filters = [("status", &self.status), ("search", &self.search)];
        for (name, value) in filters {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((name, value.to_owned()));
            }
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
struct RoleOnly {
    #[serde(default)]
    role: String,
}

/// Handle over the identity service.
#[derive(Debug, Clone, Deref)]
pub struct IdentityBackend(UpstreamService);

impl IdentityBackend {
    /// Wraps an upstream service.
    pub fn new(service: UpstreamService) -> Self {
        Self(service)
    }

    /// Forwards a registration.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<UpstreamResponse> {
        self.call(UpstreamRequest::post("/api/v1/register").with_json(payload)?)
            .await
    }

    /// Forwards credentials along with the caller's user agent and address.
    pub async fn login(&self, payload: &LoginRequest, client: &ClientInfo) -> Result<UpstreamResponse> {
        let mut request = UpstreamRequest::post("/api/v1/login").with_json(payload)?;
        if let Ok(user_agent) = HeaderValue::from_str(&client.user_agent)
            && !client.user_agent.is_empty()
        {
            request = request.with_header(USER_AGENT, user_agent);
        }
        if let Ok(ip_addr) = HeaderValue::from_str(&client.ip_addr)
            && !client.ip_addr.is_empty()
        {
            request = request.with_header(X_FORWARDED_FOR, ip_addr);
        }
        self.call(request).await
    }

    pub async fn logout(&self, identity: &Identity) -> Result<UpstreamResponse> {
        self.call(UpstreamRequest::post("/api/v1/logout").with_headers(identity.to_headers()))
            .await
    }

    pub async fn profile(&self, identity: &Identity) -> Result<UpstreamResponse> {
        self.call(UpstreamRequest::get("/api/v1/profile").with_headers(identity.to_headers()))
            .await
    }

    pub async fn update_profile(&self, identity: &Identity, body: Bytes) -> Result<UpstreamResponse> {
        let request = UpstreamRequest::put("/api/v1/profile").with_headers(identity.to_headers());
        self.call(json_request(request, body)).await
    }

    /// Lists the caller's sessions. The identity service authenticates these
    /// calls with the caller's own bearer token.
    pub async fn sessions(&self, authorization: &HeaderValue) -> Result<UpstreamResponse> {
        self.call(UpstreamRequest::get("/api/v1/sessions").with_header(AUTHORIZATION, authorization.clone()))
            .await
    }

    pub async fn delete_session(
        &self,
        authorization: &HeaderValue,
        session_id: Uuid,
    ) -> Result<UpstreamResponse> {
        let path = format!("/api/v1/sessions/{session_id}");
        self.call(UpstreamRequest::delete(path).with_header(AUTHORIZATION, authorization.clone()))
            .await
    }

    pub async fn revoke_all_sessions(&self, authorization: &HeaderValue) -> Result<UpstreamResponse> {
        let request = UpstreamRequest::post("/api/v1/sessions/revoke-all")
            .with_header(AUTHORIZATION, authorization.clone());
        self.call(request).await
    }

    /// Fetches one account as seen by `identity`.
    pub async fn user(&self, identity: &Identity, user_id: &str) -> Result<UpstreamResponse> {
        let path = format!("/api/v1/users/{user_id}");
        self.call(UpstreamRequest::get(path).with_headers(identity.to_headers()))
            .await
    }

    /// Returns the role of the admitted account.
    pub async fn role(&self, identity: &Identity) -> Result<String> {
        let path = format!("/api/v1/users/{}", identity.user_id);
        let record: RoleOnly = self
            .fetch(UpstreamRequest::get(path).with_headers(identity.to_headers()))
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            user_id = %identity.user_id,
            role = %record.role,
            "Resolved account role"
        );
        Ok(record.role)
    }

    pub async fn users(&self, identity: &Identity, query: &ListUsersQuery) -> Result<UpstreamResponse> {
        let request = UpstreamRequest::get("/api/v1/users")
            .with_query(query.to_pairs())
            .with_headers(identity.to_headers());
        self.call(request).await
    }

    pub async fn session_stats(&self, identity: &Identity) -> Result<SessionStats> {
        let request = UpstreamRequest::get("/api/v1/activity-sessions/user/me/stats")
            .with_headers(identity.to_headers());
        self.fetch(request).await
    }
}

/// Attaches a JSON body, leaving the request bodiless when `body` is empty.
pub(crate) fn json_request(request: UpstreamRequest, body: Bytes) -> UpstreamRequest {
    if body.is_empty() {
        return request;
    }
    request
        .with_header(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .with_body(body)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use bff_upstream::mock::MockUpstream;
    use serde_json::json;

    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "admin@example.com".to_owned(),
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn list_query_skips_blank_filters() {
        let query = ListUsersQuery {
            status: Some("  ".to_owned()),
            search: Some("ada".to_owned()),
            ..ListUsersQuery::default()
        };

        assert_eq!(query.to_pairs(), vec![
            ("page", "1".to_owned()),
            ("page_size", "20".to_owned()),
            ("search", "ada".to_owned()),
        ]);
    }

    #[tokio::test]
    async fn login_forwards_client_headers() -> anyhow::Result<()> {
        let mock = MockUpstream::new();
        let backend = IdentityBackend::new(mock.clone().into_service("identity"));
        let client = ClientInfo {
            user_agent: "Mozilla/5.0".to_owned(),
            ip_addr: "203.0.113.7".to_owned(),
        };

        let credentials = LoginRequest {
            email: "learner@example.com".to_owned(),
            password: "correct horse".to_owned(),
            mfa_code: None,
        };

        backend.login(&credentials, &client).await?;

        let calls = mock.calls();
        assert_eq!(calls[0].path, "/api/v1/login");
        assert_eq!(calls[0].body.as_deref(), Some(&br#"{"email":"learner@example.com","password":"correct horse"}"#[..]));
        assert_eq!(calls[0].headers[USER_AGENT], "Mozilla/5.0");
        assert_eq!(calls[0].headers[X_FORWARDED_FOR], "203.0.113.7");
        Ok(())
    }

    #[tokio::test]
    async fn role_reads_own_record_with_identity_headers() -> anyhow::Result<()> {
        let identity = identity();
        let path = format!("/api/v1/users/{}", identity.user_id);
        let mock = MockUpstream::new().with_data(Method::GET, &path, json!({"role": "super-admin"}));
        let backend = IdentityBackend::new(mock.clone().into_service("identity"));

        assert_eq!(backend.role(&identity).await?, "super-admin");
        assert_eq!(mock.calls()[0].headers["x-user-id"], identity.user_id.to_string().as_str());
        Ok(())
    }
}
