//! Byte-level key-value backends.

use async_nats::jetstream::{self, kv};
use bytes::Bytes;

use super::KvBucket;
use crate::{Error, Result, TRACING_TARGET_KV};

/// Raw access to one key-value bucket.
///
/// Typed stores are built on top of this trait so they can run against a
/// NATS JetStream bucket in production and an in-process map in tests.
/// Implementations must provide atomic single-key writes and read-after-write
/// consistency for a single key.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Returns the bucket name.
    fn bucket(&self) -> &str;

    /// Writes `value` at `key`, replacing any previous value. Returns the new revision.
    async fn put(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Reads the value at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Removes `key` and its history. Removing an absent key succeeds.
    async fn purge(&self, key: &str) -> Result<()>;
}

/// [`KvBackend`] over a NATS JetStream key-value bucket.
#[derive(Clone)]
pub struct JetStreamBackend {
    store: kv::Store,
    bucket: &'static str,
    max_age: std::time::Duration,
}

impl std::fmt::Debug for JetStreamBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetStreamBackend")
            .field("bucket", &self.bucket)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl JetStreamBackend {
    /// Get or create the bucket described by `B` with the given `max_age`.
    ///
    /// An existing bucket keeps the `max_age` it was created with; a bound
    /// shorter than requested is logged and reported by [`Self::max_age`].
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_KV)]
    pub(crate) async fn open<B: KvBucket>(
        jetstream: &jetstream::Context,
        max_age: std::time::Duration,
    ) -> Result<Self> {
        let (store, effective_max_age) = match jetstream.get_key_value(B::NAME).await {
            Ok(store) => {
                // Zero means entries never age out.
                let existing = match store.status().await {
                    Ok(status) if !status.max_age().is_zero() => status.max_age(),
                    Ok(_) => max_age,
                    Err(error) => {
                        tracing::warn!(
                            target: TRACING_TARGET_KV,
                            bucket = %B::NAME,
                            error = %error,
                            "Failed to read KV bucket status, assuming requested max age"
                        );
                        max_age
                    }
                };
                if existing < max_age {
                    tracing::warn!(
                        target: TRACING_TARGET_KV,
                        bucket = %B::NAME,
                        requested_secs = max_age.as_secs(),
                        existing_secs = existing.as_secs(),
                        "Existing KV bucket evicts entries sooner than requested"
                    );
                }
                tracing::debug!(
                    target: TRACING_TARGET_KV,
                    bucket = %B::NAME,
                    "Using existing KV bucket"
                );
                (store, existing)
            }
            Err(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_KV,
                    bucket = %B::NAME,
                    max_age_secs = max_age.as_secs(),
                    "Creating new KV bucket"
                );
                let config = kv::Config {
                    bucket: B::NAME.to_string(),
                    description: B::DESCRIPTION.to_string(),
                    max_age,
                    history: 1,
                    ..Default::default()
                };
                let store = jetstream
                    .create_key_value(config)
                    .await
                    .map_err(|e| Error::operation("kv_create", e.to_string()))?;
                (store, max_age)
            }
        };

        Ok(Self {
            store,
            bucket: B::NAME,
            max_age: effective_max_age,
        })
    }

    /// Returns the age after which the bucket evicts entries.
    #[inline]
    pub fn max_age(&self) -> std::time::Duration {
        self.max_age
    }
}

#[async_trait::async_trait]
impl KvBackend for JetStreamBackend {
    fn bucket(&self) -> &str {
        self.bucket
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        self.store
            .put(key, value)
            .await
            .map_err(|e| Error::operation("kv_put", e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.store
            .get(key)
            .await
            .map_err(|e| Error::operation("kv_get", e.to_string()))
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.store
            .purge(key)
            .await
            .map_err(|e| Error::operation("kv_delete", e.to_string()))
    }
}
