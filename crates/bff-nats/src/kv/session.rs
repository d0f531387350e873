//! Session records backing the authentication gate.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{KvBackend, KvStore, SessionKey, SessionsBucket};
use crate::{Result, TRACING_TARGET_KV};

/// Server-side proof that a session is live and who owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Account that owns the session.
    pub user_id: Uuid,
    /// Email of the owning account at login time.
    pub email: String,
    /// `User-Agent` presented at login.
    #[serde(default)]
    pub user_agent: String,
    /// Client address presented at login.
    #[serde(default)]
    pub ip_addr: String,
    /// When the session was created.
    pub created_at: Timestamp,
}

impl SessionRecord {
    /// Creates a record for `user_id` stamped with the current time.
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            user_agent: String::new(),
            ip_addr: String::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Sets the login user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the login client address.
    #[must_use]
    pub fn with_ip_addr(mut self, ip_addr: impl Into<String>) -> Self {
        self.ip_addr = ip_addr.into();
        self
    }
}

/// Session store keyed by session id.
///
/// Every call round-trips the backing bucket; nothing is cached in process,
/// so a revocation is visible to the very next lookup.
#[derive(Clone)]
pub struct SessionStore {
    store: KvStore<SessionKey, SessionRecord, SessionsBucket>,
    max_ttl: Option<Duration>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("bucket", &self.store.bucket_name())
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl SessionStore {
    /// Creates a session store over the given backend.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            store: KvStore::new(backend),
            max_ttl: None,
        }
    }

    /// Bounds every record's lifetime, matching the bucket's `max_age`.
    #[must_use]
    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    /// Returns the lifetime a record put with `ttl` actually gets.
    #[inline]
    pub fn clamp_ttl(&self, ttl: Duration) -> Duration {
        match self.max_ttl {
            Some(max_ttl) => ttl.min(max_ttl),
            None => ttl,
        }
    }

    /// Stores `record` under `session_id`, replacing any existing record.
    ///
    /// The record expires `ttl` from now, or at the store's `max_ttl` if
    /// that comes first.
    pub async fn put(&self, session_id: Uuid, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let requested = ttl;
        let ttl = self.clamp_ttl(requested);
        if ttl < requested {
            tracing::warn!(
                target: TRACING_TARGET_KV,
                session_id = %session_id,
                requested_secs = requested.as_secs(),
                max_ttl_secs = ttl.as_secs(),
                "Session lifetime exceeds the bucket bound, clamped"
            );
        }

        self.store
            .put_with_ttl(&SessionKey(session_id), record, ttl)
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            session_id = %session_id,
            user_id = %record.user_id,
            ttl_secs = ttl.as_secs(),
            "Session stored"
        );
        Ok(())
    }

    /// Looks up a session. `Ok(None)` means expired, revoked or never created.
    pub async fn get(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        self.store.get_value(&SessionKey(session_id)).await
    }

    /// Removes a session. Removing an absent session succeeds.
    pub async fn delete(&self, session_id: Uuid) -> Result<()> {
        self.store.delete(&SessionKey(session_id)).await
    }

    /// Removes every listed session.
    ///
    /// All deletions are attempted even if some fail; the first failure is
    /// returned after the rest have run.
    pub async fn delete_many(&self, session_ids: impl IntoIterator<Item = Uuid>) -> Result<()> {
        let deletions = session_ids
            .into_iter()
            .map(|session_id| async move { (session_id, self.delete(session_id).await) });
        let results = futures::future::join_all(deletions).await;

        let count = results.len();
        let mut first_error = None;
        for (session_id, result) in results {
            if let Err(error) = result {
                tracing::warn!(
                    target: TRACING_TARGET_KV,
                    session_id = %session_id,
                    error = %error,
                    "Failed to delete session"
                );
                first_error.get_or_insert(error);
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_KV,
            count = count,
            failed = first_error.is_some(),
            "Bulk session deletion finished"
        );

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Returns `true` if a live session exists.
    pub async fn exists(&self, session_id: Uuid) -> Result<bool> {
        self.store.exists(&SessionKey(session_id)).await
    }
}
