//! NATS client wrapper and connection management.
//!
//! The `NatsClient` wraps a single multiplexed `async-nats` connection. Clones
//! share the same TCP connection, so one client is created at startup and
//! handed to every store that needs a bucket.

use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, jetstream};
use tokio::time::timeout;

use super::nats_config::NatsConfig;
use crate::kv::{
    DerivedCache, DerivedDataBucket, JetStreamBackend, KvBucket, SessionStore, SessionsBucket,
};
use crate::{Error, Result, TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// NATS client wrapper with connection management.
///
/// This wrapper is cheaply cloneable and thread-safe.
#[derive(Debug, Clone)]
pub struct NatsClient {
    inner: Arc<NatsClientInner>,
}

#[derive(Debug)]
struct NatsClientInner {
    client: Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Create a new NATS client and connect.
    #[tracing::instrument(skip(config), target = TRACING_TARGET_CONNECTION)]
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        config.validate().map_err(Error::invalid_config)?;

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            servers = %config.nats_url,
            "Connecting to NATS servers"
        );

        let mut connect_opts = ConnectOptions::new()
            .name(config.name())
            .ping_interval(config.ping_interval());

        if let Some(token) = config.nats_token.clone() {
            connect_opts = connect_opts.token(token);
        }

        if let Some(timeout) = config.connect_timeout() {
            connect_opts = connect_opts.connection_timeout(timeout);
        }

        if let Some(max_reconnects) = config.max_reconnects_option() {
            connect_opts = connect_opts.max_reconnects(max_reconnects);
        }
        let reconnect_delay_ms = config.reconnect_delay().as_millis().min(u64::MAX as u128) as u64;
        connect_opts = connect_opts.reconnect_delay_callback(move |attempts| {
            Duration::from_millis(std::cmp::min(
                reconnect_delay_ms * 2_u64.pow(attempts.min(32) as u32),
                30_000,
            ))
        });

        let connect_timeout = config.connect_timeout().unwrap_or(Duration::from_secs(30));
        let client = timeout(
            connect_timeout,
            async_nats::connect_with_options(&config.nats_url, connect_opts),
        )
        .await
        .map_err(|_| Error::timeout(connect_timeout))?
        .map_err(|e| Error::Connection(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        let server_info = client.server_info();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            server_host = %server_info.host,
            server_version = %server_info.version,
            server_id = %server_info.server_id,
            "Successfully connected to NATS"
        );

        Ok(Self {
            inner: Arc::new(NatsClientInner {
                client,
                jetstream,
                config,
            }),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &NatsConfig {
        &self.inner.config
    }

    /// Test connectivity with a flush round trip.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();

        timeout(Duration::from_secs(10), self.inner.client.flush())
            .await
            .map_err(|_| Error::timeout(Duration::from_secs(10)))?
            .map_err(|e| Error::Connection(Box::new(e)))?;

        let ping_time = start.elapsed();
        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            duration_ms = ping_time.as_millis(),
            "NATS ping successful"
        );
        Ok(ping_time)
    }

    /// Check if the client is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.inner.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }
}

// Key-value store getters
impl NatsClient {
    /// Get or create the JetStream bucket described by `B`.
    ///
    /// `max_age` overrides the bucket's default TTL; it bounds how long any
    /// entry can live regardless of its own expiry stamp.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CLIENT)]
    pub async fn kv_backend<B: KvBucket>(
        &self,
        max_age: Option<Duration>,
    ) -> Result<JetStreamBackend> {
        let max_age = max_age.or(B::TTL).unwrap_or_default();
        JetStreamBackend::open::<B>(&self.inner.jetstream, max_age).await
    }

    /// Opens the session store, sized for the longest session lifetime.
    pub async fn session_store(&self, max_session_ttl: Duration) -> Result<SessionStore> {
        let backend = self.kv_backend::<SessionsBucket>(Some(max_session_ttl)).await?;
        let max_ttl = backend.max_age();
        Ok(SessionStore::new(Arc::new(backend)).with_max_ttl(max_ttl))
    }

    /// Opens the derived-data cache, sized for the longest cache TTL.
    pub async fn derived_cache(&self, max_cache_ttl: Duration) -> Result<DerivedCache> {
        let backend = self
            .kv_backend::<DerivedDataBucket>(Some(max_cache_ttl))
            .await?;
        Ok(DerivedCache::new(Arc::new(backend)))
    }
}
