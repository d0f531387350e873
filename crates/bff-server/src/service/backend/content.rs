//! Content service: GraphQL catalog and authoring operations.

use std::sync::LazyLock;

use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use bff_nats::CachedOperation;
use bff_upstream::{Result, UpstreamRequest, UpstreamResponse, UpstreamService};
use derive_more::Deref;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

/// First named query in a GraphQL document.
static QUERY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bquery\s+([A-Za-z0-9_]+)").expect("query name pattern is valid")
});

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// GraphQL operation accepted from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GraphQlRequest {
    #[validate(custom(function = "not_blank"))]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    #[serde(
        rename = "operationName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl GraphQlRequest {
    /// Trims the document and drops empty variables and operation names.
    pub fn normalized(self) -> Self {
        Self {
            query: self.query.trim().to_owned(),
            variables: self.variables.filter(|variables| !variables.is_empty()),
            operation_name: self
                .operation_name
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty()),
        }
    }

    /// Returns the name of the first named query in the document.
    pub fn query_name(&self) -> Option<&str> {
        QUERY_NAME
            .captures(&self.query)
            .and_then(|captures| captures.get(1))
            .map(|name| name.as_str())
    }

    /// Returns the operation if its response may be cached.
    pub fn cached_operation(&self) -> Option<CachedOperation> {
        self.query_name()?.parse().ok()
    }
}

/// Handle over the content service.
#[derive(Debug, Clone, Deref)]
pub struct ContentBackend(UpstreamService);

impl ContentBackend {
    /// Wraps an upstream service.
    pub fn new(service: UpstreamService) -> Self {
        Self(service)
    }

    /// Forwards a GraphQL operation, with the caller's bearer credential
    /// when one was presented.
    pub async fn graphql(
        &self,
        authorization: Option<&HeaderValue>,
        request: &GraphQlRequest,
    ) -> Result<UpstreamResponse> {
        let mut upstream = UpstreamRequest::post("/graphql").with_json(request)?;
        if let Some(authorization) = authorization {
            upstream = upstream.with_header(AUTHORIZATION, authorization.clone());
        }
        self.call(upstream).await
    }
}
