//! Key-value key types and traits.
//!
//! NATS keys are restricted to `[-/_=.a-zA-Z0-9]`, so every key type renders
//! through [`fmt::Display`] into that alphabet and parses back with [`FromStr`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use derive_more::{Display, From};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{CacheKind, CachedOperation};
use crate::{Error, Result};

/// Marker trait for KV key types.
pub trait KvKey: fmt::Debug + fmt::Display + FromStr + Clone + Send + Sync + 'static {}

/// Key for gateway sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
#[display("{_0}")]
pub struct SessionKey(pub Uuid);

impl KvKey for SessionKey {}

impl FromStr for SessionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id =
            Uuid::parse_str(s).map_err(|e| Error::operation("parse_session_key", e.to_string()))?;
        Ok(Self(id))
    }
}

/// Key for a derived-data snapshot: `{kind}.{user_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub user_id: Uuid,
}

impl CacheKey {
    /// Creates a key for the given kind and user.
    #[inline]
    pub const fn new(kind: CacheKind, user_id: Uuid) -> Self {
        Self { kind, user_id }
    }
}

impl KvKey for CacheKey {}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.user_id)
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, user_id) = s
            .split_once('.')
            .ok_or_else(|| Error::operation("parse_cache_key", format!("missing separator: {s}")))?;
        let kind = kind
            .parse::<CacheKind>()
            .map_err(|e| Error::operation("parse_cache_key", e.to_string()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|e| Error::operation("parse_cache_key", e.to_string()))?;
        Ok(Self { kind, user_id })
    }
}

/// Key for a cached content query: `query.{operation}` or
/// `query.{operation}.{variables_digest}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub operation: CachedOperation,
    pub variables_digest: Option<String>,
}

/// JSON with object members in key order, whatever the map's own order.
enum Canonical<'a> {
    Object(&'a Map<String, Value>),
    Value(&'a Value),
}

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Object(object) => object
                .iter()
                .map(|(name, value)| (name, Canonical::Value(value)))
                .collect::<BTreeMap<_, _>>()
                .serialize(serializer),
            Self::Value(Value::Object(object)) => Canonical::Object(object).serialize(serializer),
            Self::Value(Value::Array(items)) => {
                serializer.collect_seq(items.iter().map(Canonical::Value))
            }
            Self::Value(value) => value.serialize(serializer),
        }
    }
}

impl QueryKey {
    const PREFIX: &'static str = "query";

    /// Creates the key for `operation` run with `variables`.
    ///
    /// Absent and empty variables share one key. Object members are digested
    /// in sorted order, so equal variables always produce the same digest.
    pub fn new(operation: CachedOperation, variables: Option<&Map<String, Value>>) -> Result<Self> {
        let variables_digest = match variables.filter(|variables| !variables.is_empty()) {
            Some(variables) => {
                let canonical = serde_json::to_vec(&Canonical::Object(variables))?;
                Some(hex::encode(Sha256::digest(&canonical)))
            }
            None => None,
        };

        Ok(Self {
            operation,
            variables_digest,
        })
    }
}

impl KvKey for QueryKey {}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", Self::PREFIX, self.operation)?;
        if let Some(digest) = &self.variables_digest {
            write!(f, ".{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for QueryKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        if parts.next() != Some(Self::PREFIX) {
            return Err(Error::operation("parse_query_key", format!("missing prefix: {s}")));
        }
        let operation = parts
            .next()
            .unwrap_or_default()
            .parse::<CachedOperation>()
            .map_err(|e| Error::operation("parse_query_key", e.to_string()))?;
        let variables_digest = parts.next().map(str::to_owned);
        Ok(Self {
            operation,
            variables_digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_format() {
        let id = Uuid::new_v4();
        let key = SessionKey::from(id);
        assert_eq!(key.to_string(), id.to_string());
        assert_eq!(key.to_string().parse::<SessionKey>().unwrap(), key);
    }

    #[test]
    fn cache_key_format() {
        let user_id = Uuid::new_v4();
        let key = CacheKey::new(CacheKind::WeekActivity, user_id);
        assert_eq!(key.to_string(), format!("week_activity.{user_id}"));
        assert_eq!(key.to_string().parse::<CacheKey>().unwrap(), key);
    }

    #[test]
    fn query_key_without_variables() -> anyhow::Result<()> {
        let key = QueryKey::new(CachedOperation::GetTopics, None)?;
        assert_eq!(key.to_string(), "query.GetTopics");
        assert_eq!(key, QueryKey::new(CachedOperation::GetTopics, Some(&Map::new()))?);
        assert_eq!(key.to_string().parse::<QueryKey>()?, key);
        Ok(())
    }

    #[test]
    fn query_key_digest_ignores_variable_order() -> anyhow::Result<()> {
        let first: Map<String, Value> = serde_json::from_str(r#"{"page":1,"level":"A2"}"#)?;
        let second: Map<String, Value> = serde_json::from_str(r#"{"level":"A2","page":1}"#)?;
        let other: Map<String, Value> = serde_json::from_str(r#"{"level":"B1","page":1}"#)?;
        let nested_first: Map<String, Value> =
            serde_json::from_str(r#"{"filter":{"b":[{"y":1,"x":2}],"a":true}}"#)?;
        let nested_second: Map<String, Value> =
            serde_json::from_str(r#"{"filter":{"a":true,"b":[{"x":2,"y":1}]}}"#)?;

        let key = QueryKey::new(CachedOperation::GetLevels, Some(&first))?;
        assert_eq!(key, QueryKey::new(CachedOperation::GetLevels, Some(&second))?);
        assert_ne!(key, QueryKey::new(CachedOperation::GetLevels, Some(&other))?);
        assert_eq!(
            QueryKey::new(CachedOperation::GetTags, Some(&nested_first))?,
            QueryKey::new(CachedOperation::GetTags, Some(&nested_second))?
        );

        let rendered = key.to_string();
        assert!(rendered.starts_with("query.GetLevels."));
        assert_eq!(rendered.len(), "query.GetLevels.".len() + 64);
        assert_eq!(rendered.parse::<QueryKey>()?, key);
        Ok(())
    }

    #[test]
    fn query_key_rejects_garbage() {
        assert!("query".parse::<QueryKey>().is_err());
        assert!("query.GetUsers".parse::<QueryKey>().is_err());
        assert!("streak.GetTopics".parse::<QueryKey>().is_err());
    }

    #[test]
    fn cache_key_rejects_garbage() {
        assert!("streak".parse::<CacheKey>().is_err());
        assert!("unknown.6c1a".parse::<CacheKey>().is_err());
    }
}
