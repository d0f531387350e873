use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Liveness of the gateway and its NATS connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    /// `None` when the stores run in memory.
    pub nats_connected: Option<bool>,
    pub updated_at: Timestamp,
}
