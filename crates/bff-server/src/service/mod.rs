//! Application state and dependency injection.

mod aggregate;
mod backend;
mod config;
mod security;

use bff_nats::{DerivedCache, NatsClient, SessionStore};

pub use crate::service::aggregate::{AggregateError, Aggregator, SubTask, TRACING_TARGET_AGGREGATE};
pub use crate::service::backend::{
    ActivityField, ContentBackend, DailyActivity, DailyActivityIncrement, GraphQlRequest,
    IdentityBackend, LessonStats, ListUsersQuery, LoginRequest, ProgressBackend, RegisterRequest,
    SessionStats, UserPage, UserPoints, UserProfile, UserRecord, UserStreak,
};
pub use crate::service::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::service::security::{
    AuthClaims, AuthKeys, AuthKeysConfig, TokenError, TokenValidator,
};
use crate::worker::BackgroundTasks;
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // External services:
    /// `None` when the stores run over an in-memory backend.
    pub nats: Option<NatsClient>,
    pub session_store: SessionStore,
    pub derived_cache: DerivedCache,
    pub identity: IdentityBackend,
    pub progress: ProgressBackend,
    pub content: ContentBackend,

    // Internal services:
    pub token_validator: TokenValidator,
    pub aggregator: Aggregator,
    pub background: BackgroundTasks,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Connects to NATS, opens both buckets and prepares downstream clients.
    pub async fn from_config(
        service_config: &ServiceConfig,
        background: BackgroundTasks,
    ) -> Result<Self> {
        let nats = service_config.connect_nats().await?;

        let service_state = Self {
            session_store: service_config.open_session_store(&nats).await?,
            derived_cache: service_config.open_derived_cache(&nats).await?,
            identity: service_config.identity_backend()?,
            progress: service_config.progress_backend()?,
            content: service_config.content_backend()?,
            nats: Some(nats),

            token_validator: service_config.load_token_validator()?,
            aggregator: service_config.aggregator(),
            background,
        };

        Ok(service_state)
    }
}

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::Arc;

    use bff_nats::kv::MemoryBackend;
    use bff_upstream::mock::MockUpstream;

    use super::*;

    /// In-process doubles for every external service.
    #[derive(Debug, Clone, Default)]
    pub struct MockServices {
        pub identity: MockUpstream,
        pub progress: MockUpstream,
        pub content: MockUpstream,
        pub sessions: MemoryBackend,
        pub cache: MemoryBackend,
    }

    impl ServiceState {
        /// Builds state over in-memory stores and scripted downstream services.
        pub fn from_mocks(
            service_config: &ServiceConfig,
            mocks: &MockServices,
            background: BackgroundTasks,
        ) -> Result<Self> {
            let session_store = SessionStore::new(Arc::new(mocks.sessions.clone()))
                .with_max_ttl(service_config.auth_keys.token_lifetime());
            let derived_cache = DerivedCache::new(Arc::new(mocks.cache.clone()))
                .with_ttls(service_config.cache_ttls());

            Ok(Self {
                nats: None,
                session_store,
                derived_cache,
                identity: IdentityBackend::new(mocks.identity.clone().into_service("identity")),
                progress: ProgressBackend::new(mocks.progress.clone().into_service("progress")),
                content: ContentBackend::new(mocks.content.clone().into_service("content")),

                token_validator: service_config.load_token_validator()?,
                aggregator: service_config.aggregator(),
                background,
            })
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockServices;

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(nats: Option<NatsClient>);
impl_di!(session_store: SessionStore);
impl_di!(derived_cache: DerivedCache);
impl_di!(identity: IdentityBackend);
impl_di!(progress: ProgressBackend);
impl_di!(content: ContentBackend);

// Internal services:
impl_di!(token_validator: TokenValidator);
impl_di!(aggregator: Aggregator);
impl_di!(background: BackgroundTasks);
