//! Liveness check.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use bff_nats::NatsClient;
use jiff::Timestamp;

use super::response::HealthStatus;
use crate::extract::Json;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "bff_server::handler::monitors";

/// Reports liveness; unhealthy (`503`) only when the NATS connection is down.
#[tracing::instrument(skip_all)]
async fn health_status(
    State(nats_client): State<Option<NatsClient>>,
) -> (StatusCode, Json<HealthStatus>) {
    let nats_connected = nats_client.as_ref().map(NatsClient::is_connected);
    let is_healthy = nats_connected.unwrap_or(true);

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        target: TRACING_TARGET,
        is_healthy = is_healthy,
        nats_connected = ?nats_connected,
        "Health status response prepared"
    );

    let response = HealthStatus {
        is_healthy,
        nats_connected,
        updated_at: Timestamp::now(),
    };

    (status_code, Json(response))
}

/// Returns a [`Router`] with all health monitoring routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test::TestApp;
    use crate::service::MockServices;

    #[tokio::test]
    async fn in_memory_gateway_is_healthy() -> anyhow::Result<()> {
        let app = TestApp::with_router(MockServices::default(), |_| routes())?;

        let response = app.server.get("/health").await;
        response.assert_status_ok();

        let status = response.json::<HealthStatus>();
        assert!(status.is_healthy);
        assert_eq!(status.nats_connected, None);
        Ok(())
    }
}
