//! Cache-aside storage for derived per-user snapshots and whitelisted
//! content queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CacheKey, DerivedDataBucket, KvBackend, KvStore, QueryKey};
use crate::{Result, TRACING_TARGET_KV};

/// Kind of derived snapshot. Each kind has its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CacheKind {
    /// Current and longest streak summary.
    Streak,
    /// Seven days of daily activity.
    WeekActivity,
}

impl CacheKind {
    /// Returns the default time-to-live for this kind.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::Streak => Duration::from_secs(5 * 60),
            Self::WeekActivity => Duration::from_secs(10 * 60),
        }
    }
}

/// Content query whose successful response may be cached.
///
/// Only catalog reads that look the same to every caller are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum CachedOperation {
    GetTopics,
    GetLevels,
    GetTags,
}

impl CachedOperation {
    /// Returns the time-to-live of a cached response to this operation.
    #[must_use]
    pub const fn ttl(self) -> Duration {
        match self {
            Self::GetTopics | Self::GetLevels | Self::GetTags => Duration::from_secs(5 * 60),
        }
    }

    /// Returns the longest TTL of any operation.
    #[must_use]
    pub fn max_ttl() -> Duration {
        Self::iter().map(Self::ttl).max().unwrap_or_default()
    }
}

/// Invalidation epoch of one user.
///
/// Captured before a live read; a refill tagged with an older generation is
/// dropped so it cannot resurrect data an invalidation removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Per-kind TTL overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub streak: Duration,
    pub week_activity: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            streak: CacheKind::Streak.default_ttl(),
            week_activity: CacheKind::WeekActivity.default_ttl(),
        }
    }
}

impl CacheTtls {
    /// Returns the TTL configured for `kind`.
    #[must_use]
    pub const fn get(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Streak => self.streak,
            CacheKind::WeekActivity => self.week_activity,
        }
    }

    /// Returns the longest configured TTL, content queries included.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.streak
            .max(self.week_activity)
            .max(CachedOperation::max_ttl())
    }
}

/// Derived-data cache keyed by `(kind, user_id)`, plus content query
/// responses keyed by operation and variables.
///
/// Writes replace the whole snapshot and set a fresh expiry for that kind
/// only. A read returns `Ok(None)` on a miss; an unreachable store or an
/// undecodable entry is an `Err`, which callers treat as a miss.
///
/// Generations are tracked in process. Across several gateway instances a
/// refill racing an invalidation elsewhere is bounded by the kind's TTL.
#[derive(Clone)]
pub struct DerivedCache {
    store: KvStore<CacheKey, serde_json::Value, DerivedDataBucket>,
    queries: KvStore<QueryKey, serde_json::Value, DerivedDataBucket>,
    generations: Arc<RwLock<HashMap<Uuid, u64>>>,
    ttls: CacheTtls,
}

impl std::fmt::Debug for DerivedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedCache")
            .field("bucket", &self.store.bucket_name())
            .field("ttls", &self.ttls)
            .finish()
    }
}

impl DerivedCache {
    /// Creates a cache over the given backend with default TTLs.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            store: KvStore::new(backend.clone()),
            queries: KvStore::new(backend),
            generations: Arc::default(),
            ttls: CacheTtls::default(),
        }
    }

    /// Replaces the per-kind TTLs.
    #[must_use]
    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Returns the configured TTL for `kind`.
    #[inline]
    pub fn ttl(&self, kind: CacheKind) -> Duration {
        self.ttls.get(kind)
    }

    /// Reads the snapshot for `(kind, user_id)`.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn read<T>(&self, kind: CacheKind, user_id: Uuid) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.store.get_value(&CacheKey::new(kind, user_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Writes the snapshot for `(kind, user_id)`, expiring `ttl` from now.
    #[tracing::instrument(skip(self, snapshot), target = TRACING_TARGET_KV)]
    pub async fn write<T>(
        &self,
        kind: CacheKind,
        user_id: Uuid,
        snapshot: &T,
        ttl: Duration,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(snapshot)?;
        self.store
            .put_with_ttl(&CacheKey::new(kind, user_id), &value, ttl)
            .await?;
        Ok(())
    }

    /// Writes the snapshot using the configured TTL for `kind`.
    pub async fn write_default<T>(&self, kind: CacheKind, user_id: Uuid, snapshot: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.write(kind, user_id, snapshot, self.ttl(kind)).await
    }

    /// Returns the current invalidation generation of `user_id`.
    pub async fn generation(&self, user_id: Uuid) -> Generation {
        let generations = self.generations.read().await;
        Generation(generations.get(&user_id).copied().unwrap_or_default())
    }

    /// Writes the snapshot with the configured TTL, unless `user_id` was
    /// invalidated after `seen` was taken. Returns `true` if it was written.
    ///
    /// The generation stays locked for the duration of the write, so an
    /// invalidation either precedes the check or removes the new entry.
    pub async fn write_if_current<T>(
        &self,
        kind: CacheKind,
        user_id: Uuid,
        snapshot: &T,
        seen: Generation,
    ) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let generations = self.generations.read().await;
        let current = Generation(generations.get(&user_id).copied().unwrap_or_default());
        if current != seen {
            tracing::debug!(
                target: TRACING_TARGET_KV,
                kind = %kind,
                user_id = %user_id,
                "Snapshot outdated by an invalidation, refill skipped"
            );
            return Ok(false);
        }

        self.write_default(kind, user_id, snapshot).await?;
        Ok(true)
    }

    /// Removes the snapshot for `(kind, user_id)`.
    pub async fn invalidate(&self, kind: CacheKind, user_id: Uuid) -> Result<()> {
        self.store.delete(&CacheKey::new(kind, user_id)).await
    }

    /// Removes every kind of snapshot for `user_id` and advances its
    /// generation, so refills started before this call are dropped.
    ///
    /// All kinds are attempted; the first failure is returned.
    pub async fn invalidate_all(&self, user_id: Uuid) -> Result<()> {
        {
            let mut generations = self.generations.write().await;
            *generations.entry(user_id).or_default() += 1;
        }

        let results =
            futures::future::join_all(CacheKind::iter().map(|kind| self.invalidate(kind, user_id)))
                .await;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            user_id = %user_id,
            "Invalidated derived snapshots"
        );

        results.into_iter().collect()
    }

    /// Reads the cached response to a content query.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn read_query(&self, key: &QueryKey) -> Result<Option<serde_json::Value>> {
        self.queries.get_value(key).await
    }

    /// Caches the response to a content query for its operation's TTL.
    #[tracing::instrument(skip(self, response), target = TRACING_TARGET_KV)]
    pub async fn write_query(&self, key: &QueryKey, response: &serde_json::Value) -> Result<()> {
        let ttl = key.operation.ttl();
        self.queries.put_with_ttl(key, response, ttl).await?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            operation = %key.operation,
            ttl_secs = ttl.as_secs(),
            "Cached content query response"
        );
        Ok(())
    }
}
