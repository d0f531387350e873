//! Type-safe key-value store with per-entry expiry.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{KvBackend, KvBucket, KvKey};
use crate::{Error, Result, TRACING_TARGET_KV};

/// Stored envelope: the value plus the instant it stops being valid.
///
/// JetStream buckets only support one `max_age` per bucket, so the exact
/// per-entry deadline travels with the value and is enforced on read.
#[derive(Debug, Serialize, Deserialize)]
struct KvRecord<V> {
    value: V,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

/// Type-safe key-value store.
///
/// This store is generic over:
/// - `K`: The key type (determines the key layout)
/// - `V`: The value type to store (must be serializable)
/// - `B`: The bucket configuration (determines name and default TTL)
pub struct KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    backend: Arc<dyn KvBackend>,
    _marker: PhantomData<fn() -> (K, V, B)>,
}

impl<K, V, B> Clone for KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, B> KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    /// Creates a store over the given backend.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Returns the bucket name.
    #[inline]
    pub fn bucket_name(&self) -> &'static str {
        B::NAME
    }

    /// Put a value using the bucket's default TTL.
    pub async fn put(&self, key: &K, value: &V) -> Result<KvEntry> {
        let expires_at = match B::TTL {
            Some(ttl) => Some(expiry_after(ttl)?),
            None => None,
        };
        self.put_record(key, value, expires_at).await
    }

    /// Put a value that expires exactly `ttl` from now.
    ///
    /// Any previous value at `key` is replaced, along with its expiry.
    pub async fn put_with_ttl(&self, key: &K, value: &V, ttl: Duration) -> Result<KvEntry> {
        self.put_record(key, value, Some(expiry_after(ttl)?)).await
    }

    #[tracing::instrument(skip(self, value), target = TRACING_TARGET_KV)]
    async fn put_record(
        &self,
        key: &K,
        value: &V,
        expires_at: Option<Timestamp>,
    ) -> Result<KvEntry> {
        let key_str = key.to_string();
        let json = serde_json::to_vec(&KvRecord { value, expires_at })?;
        let size = json.len();
        let revision = self.backend.put(&key_str, json.into()).await?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            bucket = %B::NAME,
            key = %key_str,
            revision = revision,
            size_bytes = size,
            "Put value to KV store"
        );

        Ok(KvEntry {
            key: key_str,
            revision,
            size: size as u64,
            expires_at,
        })
    }

    /// Get a value from the store.
    ///
    /// An entry whose expiry has passed is purged and reported as absent.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn get(&self, key: &K) -> Result<Option<KvValue<V>>> {
        let key_str = key.to_string();
        let Some(bytes) = self.backend.get(&key_str).await? else {
            tracing::debug!(
                target: TRACING_TARGET_KV,
                bucket = %B::NAME,
                key = %key_str,
                "Key not found in KV store"
            );
            return Ok(None);
        };

        let record: KvRecord<V> = serde_json::from_slice(&bytes)?;
        if let Some(expires_at) = record.expires_at
            && Timestamp::now() >= expires_at
        {
            tracing::debug!(
                target: TRACING_TARGET_KV,
                bucket = %B::NAME,
                key = %key_str,
                expires_at = %expires_at,
                "Entry expired, purging"
            );
            self.backend.purge(&key_str).await?;
            return Ok(None);
        }

        Ok(Some(KvValue {
            key: key_str,
            value: record.value,
            size: bytes.len() as u64,
            expires_at: record.expires_at,
        }))
    }

    /// Get a value, returning just the data.
    pub async fn get_value(&self, key: &K) -> Result<Option<V>> {
        Ok(self.get(key).await?.map(|kv| kv.value))
    }

    /// Delete a key from the store. Deleting an absent key succeeds.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn delete(&self, key: &K) -> Result<()> {
        let key_str = key.to_string();
        self.backend.purge(&key_str).await?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            bucket = %B::NAME,
            key = %key_str,
            "Deleted key from KV store"
        );
        Ok(())
    }

    /// Check if a live (unexpired) entry exists at `key`.
    pub async fn exists(&self, key: &K) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

fn expiry_after(ttl: Duration) -> Result<Timestamp> {
    Timestamp::now()
        .checked_add(ttl)
        .map_err(|e| Error::operation("kv_expiry", e.to_string()))
}

/// KV entry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub revision: u64,
    pub size: u64,
    pub expires_at: Option<Timestamp>,
}

/// KV value with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvValue<V> {
    pub key: String,
    pub value: V,
    pub size: u64,
    pub expires_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryBackend, SessionKey, SessionsBucket};

    type Store = KvStore<SessionKey, String, SessionsBucket>;

    fn store() -> (MemoryBackend, Store) {
        let backend = MemoryBackend::new();
        (backend.clone(), Store::new(Arc::new(backend)))
    }

    #[tokio::test]
    async fn put_then_get_returns_value() -> anyhow::Result<()> {
        let (_, store) = store();
        let key = SessionKey(uuid::Uuid::new_v4());

        let entry = store.put(&key, &"hello".to_string()).await?;
        assert_eq!(entry.key, key.to_string());
        assert!(entry.expires_at.is_some());

        assert_eq!(store.get_value(&key).await?.as_deref(), Some("hello"));
        Ok(())
    }

    #[tokio::test]
    async fn expired_entry_is_purged_on_read() -> anyhow::Result<()> {
        let (backend, store) = store();
        let key = SessionKey(uuid::Uuid::new_v4());

        store
            .put_with_ttl(&key, &"short".to_string(), Duration::from_millis(20))
            .await?;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get(&key).await?.is_none());
        assert!(backend.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn put_replaces_expiry() -> anyhow::Result<()> {
        let (_, store) = store();
        let key = SessionKey(uuid::Uuid::new_v4());

        store
            .put_with_ttl(&key, &"first".to_string(), Duration::from_millis(20))
            .await?;
        store
            .put_with_ttl(&key, &"second".to_string(), Duration::from_secs(60))
            .await?;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get_value(&key).await?.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_entry_is_an_error() {
        let (backend, store) = store();
        let key = SessionKey(uuid::Uuid::new_v4());
        backend.insert_raw(key.to_string(), "{not json").await;

        let error = store.get(&key).await.unwrap_err();
        assert!(error.is_corrupt_entry());
    }
}
