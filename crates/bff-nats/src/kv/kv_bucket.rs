//! Key-value bucket configuration traits.

use std::time::Duration;

/// Marker trait for KV bucket configuration.
///
/// This trait defines the configuration for a NATS KV bucket.
pub trait KvBucket: Clone + Send + Sync + 'static {
    /// Bucket name used in NATS KV.
    const NAME: &'static str;

    /// Human-readable description for the bucket.
    const DESCRIPTION: &'static str;

    /// Default upper bound on entry age for this bucket.
    /// Returns `None` for buckets where entries should not expire.
    const TTL: Option<Duration>;
}

/// Bucket for authenticated gateway sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionsBucket;

impl KvBucket for SessionsBucket {
    const NAME: &'static str = "bff_sessions";
    const DESCRIPTION: &'static str = "Gateway session records";
    const TTL: Option<Duration> = Some(Duration::from_secs(24 * 60 * 60)); // 24 hours
}

/// Bucket for derived per-user snapshots (streaks, weekly activity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DerivedDataBucket;

impl KvBucket for DerivedDataBucket {
    const NAME: &'static str = "bff_derived";
    const DESCRIPTION: &'static str = "Derived per-user snapshots";
    const TTL: Option<Duration> = Some(Duration::from_secs(10 * 60)); // 10 minutes
}
