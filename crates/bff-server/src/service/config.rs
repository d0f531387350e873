use std::time::Duration;

use bff_nats::{CacheTtls, DerivedCache, NatsClient, NatsConfig, SessionStore};
use bff_upstream::reqwest::{ReqwestClient, ReqwestConfig};
#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::service::{
    Aggregator, AuthKeys, AuthKeysConfig, ContentBackend, IdentityBackend, ProgressBackend,
    TokenValidator,
};
use crate::{Error, Result};

/// Default values for configuration options.
mod defaults {
    /// Default identity service URL for development.
    pub const USER_SERVICE_URL: &str = "http://127.0.0.1:8001";

    /// Default lesson and progress service URL for development.
    pub const LESSON_SERVICE_URL: &str = "http://127.0.0.1:8002";

    /// Default content service URL for development.
    pub const CONTENT_SERVICE_URL: &str = "http://127.0.0.1:8003";

    /// Default streak snapshot lifetime in seconds.
    pub const STREAK_CACHE_TTL: u64 = 300;

    /// Default week-of-activity snapshot lifetime in seconds.
    pub const WEEK_ACTIVITY_CACHE_TTL: u64 = 600;

    /// Default deadline for fail-fast aggregations in seconds.
    pub const AGGREGATE_DEADLINE: u64 = 10;
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// NATS connection backing the session store and the derived-data cache.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    pub nats: NatsConfig,

    /// Token signing secret and lifetime.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    pub auth_keys: AuthKeysConfig,

    /// Base URL of the identity service.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "USER_SERVICE_URL", default_value = defaults::USER_SERVICE_URL)
    )]
    #[builder(default = "defaults::USER_SERVICE_URL.to_owned()")]
    pub user_service_url: String,

    /// Base URL of the lesson and progress service.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "LESSON_SERVICE_URL", default_value = defaults::LESSON_SERVICE_URL)
    )]
    #[builder(default = "defaults::LESSON_SERVICE_URL.to_owned()")]
    pub lesson_service_url: String,

    /// Base URL of the content service.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CONTENT_SERVICE_URL", default_value = defaults::CONTENT_SERVICE_URL)
    )]
    #[builder(default = "defaults::CONTENT_SERVICE_URL.to_owned()")]
    pub content_service_url: String,

    /// HTTP client settings shared by every downstream service.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    pub http: ReqwestConfig,

    /// Lifetime of cached streak snapshots in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STREAK_CACHE_TTL", default_value_t = defaults::STREAK_CACHE_TTL)
    )]
    #[builder(default = "defaults::STREAK_CACHE_TTL")]
    pub streak_cache_ttl: u64,

    /// Lifetime of cached week-of-activity snapshots in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "WEEK_ACTIVITY_CACHE_TTL", default_value_t = defaults::WEEK_ACTIVITY_CACHE_TTL)
    )]
    #[builder(default = "defaults::WEEK_ACTIVITY_CACHE_TTL")]
    pub week_activity_cache_ttl: u64,

    /// Deadline for fail-fast aggregations in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AGGREGATE_DEADLINE", default_value_t = defaults::AGGREGATE_DEADLINE)
    )]
    #[builder(default = "defaults::AGGREGATE_DEADLINE")]
    pub aggregate_deadline: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            auth_keys: AuthKeysConfig::default(),
            user_service_url: defaults::USER_SERVICE_URL.to_owned(),
            lesson_service_url: defaults::LESSON_SERVICE_URL.to_owned(),
            content_service_url: defaults::CONTENT_SERVICE_URL.to_owned(),
            http: ReqwestConfig::default(),
            streak_cache_ttl: defaults::STREAK_CACHE_TTL,
            week_activity_cache_ttl: defaults::WEEK_ACTIVITY_CACHE_TTL,
            aggregate_deadline: defaults::AGGREGATE_DEADLINE,
        }
    }
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Returns the per-kind cache lifetimes.
    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            streak: Duration::from_secs(self.streak_cache_ttl),
            week_activity: Duration::from_secs(self.week_activity_cache_ttl),
        }
    }

    /// Returns the fail-fast aggregation deadline.
    pub fn aggregate_deadline(&self) -> Duration {
        Duration::from_secs(self.aggregate_deadline)
    }

    /// Connects to the NATS server.
    pub async fn connect_nats(&self) -> Result<NatsClient> {
        NatsClient::connect(self.nats.clone())
            .await
            .map_err(|e| Error::external("NATS", "Failed to connect to NATS").with_source(e))
    }

    /// Opens the session bucket, bounded by the token lifetime.
    pub async fn open_session_store(&self, nats: &NatsClient) -> Result<SessionStore> {
        nats.session_store(self.auth_keys.token_lifetime())
            .await
            .map_err(|e| Error::external("NATS", "Failed to open session store").with_source(e))
    }

    /// Opens the derived-data bucket with the configured lifetimes.
    pub async fn open_derived_cache(&self, nats: &NatsClient) -> Result<DerivedCache> {
        let ttls = self.cache_ttls();
        let cache = nats
            .derived_cache(ttls.max())
            .await
            .map_err(|e| Error::external("NATS", "Failed to open derived cache").with_source(e))?;
        Ok(cache.with_ttls(ttls))
    }

    /// Builds the token validator from the configured secret.
    pub fn load_token_validator(&self) -> Result<TokenValidator> {
        AuthKeys::from_config(&self.auth_keys).map(TokenValidator::new)
    }

    /// Creates the identity service handle.
    pub fn identity_backend(&self) -> Result<IdentityBackend> {
        let client = ReqwestClient::new(&self.user_service_url, self.http.clone())
            .map_err(|e| Error::config("Invalid USER_SERVICE_URL").with_source(e))?;
        Ok(IdentityBackend::new(client.into_service("identity")))
    }

    /// Creates the lesson and progress service handle.
    pub fn progress_backend(&self) -> Result<ProgressBackend> {
        let client = ReqwestClient::new(&self.lesson_service_url, self.http.clone())
            .map_err(|e| Error::config("Invalid LESSON_SERVICE_URL").with_source(e))?;
        Ok(ProgressBackend::new(client.into_service("progress")))
    }

    /// Creates the content service handle.
    pub fn content_backend(&self) -> Result<ContentBackend> {
        let client = ReqwestClient::new(&self.content_service_url, self.http.clone())
            .map_err(|e| Error::config("Invalid CONTENT_SERVICE_URL").with_source(e))?;
        Ok(ContentBackend::new(client.into_service("content")))
    }

    /// Creates the aggregator with the configured deadline.
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.aggregate_deadline())
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> Result<(), String> {
        for (name, url) in [
            ("User service URL", &builder.user_service_url),
            ("Lesson service URL", &builder.lesson_service_url),
            ("Content service URL", &builder.content_service_url),
        ] {
            if let Some(url) = url
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                return Err(format!("{name} must start with 'http://' or 'https://'"));
            }
        }

        for (name, secs) in [
            ("Streak cache TTL", builder.streak_cache_ttl),
            ("Week activity cache TTL", builder.week_activity_cache_ttl),
            ("Aggregate deadline", builder.aggregate_deadline),
        ] {
            if secs == Some(0) {
                return Err(format!("{name} must be at least 1 second"));
            }
        }

        if let Some(auth_keys) = &builder.auth_keys {
            auth_keys.validate().map_err(|e| e.message().to_owned())?;
        }

        Ok(())
    }
}
