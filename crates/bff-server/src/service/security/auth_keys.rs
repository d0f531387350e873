//! Shared HS256 secret used to sign and verify bearer tokens.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};

use super::TRACING_TARGET_SECURITY;
use crate::{Error, Result};

/// Development-only secret. Accepted, but loudly.
pub(crate) const DEV_JWT_SECRET: &str = "change-me-dev-secret";
/// Shortest accepted secret, in bytes.
const MIN_SECRET_LEN: usize = 16;
const DEFAULT_EXPIRES_IN_SECS: u64 = 86_400;

/// Token key configuration.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct AuthKeysConfig {
    /// Shared secret for HS256 signatures (at least 16 bytes).
    #[cfg_attr(
        feature = "config",
        arg(long = "jwt-secret", env = "JWT_SECRET", default_value = DEV_JWT_SECRET)
    )]
    pub jwt_secret: String,

    /// Lifetime of issued tokens in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "jwt-expires-in", env = "JWT_EXPIRES_IN", default_value_t = DEFAULT_EXPIRES_IN_SECS)
    )]
    pub jwt_expires_in: u64,
}

impl Default for AuthKeysConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_owned(),
            jwt_expires_in: DEFAULT_EXPIRES_IN_SECS,
        }
    }
}

impl fmt::Debug for AuthKeysConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeysConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .finish()
    }
}

impl AuthKeysConfig {
    /// Creates a configuration with the given secret and the default lifetime.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Self::default()
        }
    }

    /// Returns the token lifetime, which also bounds session lifetimes.
    #[inline]
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.jwt_expires_in)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(Error::config(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.jwt_expires_in == 0 {
            return Err(Error::config("JWT lifetime must be positive"));
        }
        Ok(())
    }
}

/// Encoding and decoding keys derived from the shared secret.
#[derive(Clone)]
pub struct AuthKeys {
    inner: Arc<AuthKeysInner>,
}

struct AuthKeysInner {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    config: AuthKeysConfig,
}

impl AuthKeys {
    /// Derives keys from the configuration, rejecting weak secrets.
    pub fn from_config(config: &AuthKeysConfig) -> Result<Self> {
        config.validate()?;

        if config.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!(
                target: TRACING_TARGET_SECURITY,
                "Using the development JWT secret; set JWT_SECRET in production"
            );
        }

        let secret = config.jwt_secret.as_bytes();
        let inner = Arc::new(AuthKeysInner {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            config: config.clone(),
        });

        tracing::info!(
            target: TRACING_TARGET_SECURITY,
            lifetime_secs = config.jwt_expires_in,
            "Authentication keys loaded"
        );

        Ok(Self { inner })
    }

    /// Returns a reference to the decoding key.
    #[inline]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.inner.decoding_key
    }

    /// Returns a reference to the encoding key.
    #[inline]
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.inner.encoding_key
    }

    /// Returns the configuration used to create these keys.
    #[inline]
    pub fn config(&self) -> &AuthKeysConfig {
        &self.inner.config
    }
}

impl fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeys")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
