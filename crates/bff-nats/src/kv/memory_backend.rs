//! In-process [`KvBackend`] for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;

use super::KvBackend;
use crate::{Error, Result};

/// In-memory bucket.
///
/// Clones share the same map. [`MemoryBackend::set_unavailable`] makes every
/// operation fail, which simulates the backing store being unreachable.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

#[derive(Debug, Default)]
struct MemoryBackendInner {
    entries: RwLock<HashMap<String, Bytes>>,
    revision: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of stored keys.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Returns `true` if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrites a raw value, bypassing any typed encoding.
    pub async fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.inner
            .entries
            .write()
            .await
            .insert(key.into(), value.into());
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(Error::operation(operation, "memory backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvBackend for MemoryBackend {
    fn bucket(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        self.check("kv_put")?;
        self.inner
            .entries
            .write()
            .await
            .insert(key.to_owned(), value);
        Ok(self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.check("kv_get")?;
        Ok(self.inner.entries.read().await.get(key).cloned())
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.check("kv_delete")?;
        self.inner.entries.write().await.remove(key);
        Ok(())
    }
}
