//! Error types and utilities for NATS operations.

use std::time::Duration;

/// Result type for all NATS operations in this crate.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for NATS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// NATS client/connection errors
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::Error),

    /// Serialization errors when writing or reading stored values
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timeout
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Generic operation error with context
    #[error("NATS operation failed: {operation} - {details}")]
    Operation { operation: String, details: String },
}

impl Error {
    /// Create an operation error with context
    pub fn operation(op: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Operation {
            operation: op.into(),
            details: details.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a timeout error with the given duration
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { timeout: duration }
    }

    /// Returns `true` if the stored bytes could not be decoded.
    ///
    /// Callers of the derived-data cache treat this the same as a miss.
    #[must_use]
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_display() {
        let error = Error::operation("kv_put", "bucket offline");
        let display = error.to_string();
        assert!(display.contains("kv_put"));
        assert!(display.contains("bucket offline"));
        assert!(!error.is_corrupt_entry());
    }

    #[test]
    fn serialization_error_is_corrupt_entry() {
        let source = serde_json::from_slice::<u32>(b"not json").unwrap_err();
        let error = Error::from(source);
        assert!(error.is_corrupt_entry());
    }

    #[test]
    fn timeout_error_display() {
        let error = Error::timeout(Duration::from_secs(5));
        assert!(error.to_string().contains("5s"));
    }
}
