//! Downstream request type.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;

use crate::Result;

/// A call to a downstream service, relative to the provider's base URL.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// HTTP method.
    pub method: Method,
    /// Path beginning with `/`, without the query string.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Headers forwarded to the service.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a `PUT` request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets the raw query string. Empty strings clear it.
    #[must_use]
    pub fn with_raw_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Appends url-encoded `key=value` pairs to the query string.
    #[must_use]
    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = url::form_urlencoded::Serializer::new(self.query.take().unwrap_or_default());
        for (key, value) in pairs {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
        self.with_raw_query(serializer.finish())
    }

    /// Adds a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds every header in `headers`, replacing previous values.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        let mut last_name = None;
        for (name, value) in headers {
            // HeaderMap yields `None` for repeated values of the same name.
            let name = match name {
                Some(name) => {
                    self.headers.remove(&name);
                    last_name = Some(name.clone());
                    name
                }
                None => match &last_name {
                    Some(name) => name.clone(),
                    None => continue,
                },
            };
            self.headers.append(name, value);
        }
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the JSON body.
    pub fn with_json<T>(self, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        Ok(self
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Returns the path followed by `?query` when a query is present.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_joins_parts() {
        let request = UpstreamRequest::get("/api/v1/users").with_raw_query("page=2&limit=10");
        assert_eq!(request.path_and_query(), "/api/v1/users?page=2&limit=10");

        let request = UpstreamRequest::get("/api/v1/users").with_raw_query("");
        assert_eq!(request.path_and_query(), "/api/v1/users");
    }

    #[test]
    fn query_pairs_are_encoded_and_appended() {
        let request = UpstreamRequest::get("/api/v1/daily-activity/user/me/range")
            .with_raw_query("a=1")
            .with_query([("start", "2024-01-01"), ("note", "a b")]);

        assert_eq!(
            request.query.as_deref(),
            Some("a=1&start=2024-01-01&note=a+b")
        );
    }

    #[test]
    fn json_body_sets_content_type() -> anyhow::Result<()> {
        let request =
            UpstreamRequest::post("/api/v1/auth/login").with_json(&serde_json::json!({"a": 1}))?;

        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.headers.get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert_eq!(request.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        Ok(())
    }

    #[test]
    fn with_headers_replaces_and_keeps_repeats() {
        let mut extra = HeaderMap::new();
        extra.append("x-tag", HeaderValue::from_static("one"));
        extra.append("x-tag", HeaderValue::from_static("two"));

        let request = UpstreamRequest::get("/")
            .with_header(
                HeaderName::from_static("x-tag"),
                HeaderValue::from_static("old"),
            )
            .with_headers(extra);

        let values: Vec<_> = request.headers.get_all("x-tag").iter().collect();
        assert_eq!(values, ["one", "two"]);
    }
}
