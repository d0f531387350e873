//! NATS Key-Value store operations.
//!
//! This module provides type-safe abstractions over NATS KV:
//! - `KvBackend`: byte-level bucket access (JetStream or in-memory)
//! - `KvStore<K, V, B>`: typed values with per-entry expiry
//! - `SessionStore`: session records for the authentication gate
//! - `DerivedCache`: cache-aside snapshots keyed by kind and user, and
//!   whitelisted content query responses
//!
//! # Example
//!
//! ```ignore
//! let sessions = nats_client.session_store(Duration::from_secs(86_400)).await?;
//! sessions.put(session_id, &record, Duration::from_secs(3_600)).await?;
//! assert!(sessions.exists(session_id).await?);
//! ```

mod derived_cache;
mod kv_backend;
mod kv_bucket;
mod kv_key;
mod kv_store;
#[cfg(any(test, feature = "mock"))]
mod memory_backend;
mod session;

pub use derived_cache::{CacheKind, CacheTtls, CachedOperation, DerivedCache, Generation};
pub use kv_backend::{JetStreamBackend, KvBackend};
pub use kv_bucket::{DerivedDataBucket, KvBucket, SessionsBucket};
pub use kv_key::{CacheKey, KvKey, QueryKey, SessionKey};
pub use kv_store::{KvEntry, KvStore, KvValue};
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub use memory_backend::MemoryBackend;
pub use session::{SessionRecord, SessionStore};
