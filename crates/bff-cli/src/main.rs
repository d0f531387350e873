#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use bff_server::handler::routes;
use bff_server::middleware::{
    RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt, SecurityHeadersConfig,
};
use bff_server::service::{ServiceConfig, ServiceState};
use bff_server::worker::BackgroundTasks;
use tokio_util::sync::CancellationToken;

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "bff_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "bff_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "bff_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "Application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %format!("{error:#}"),
            "Application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "Starting gateway"
    );

    cli.validate()?;
    cli.log();

    let cancel = CancellationToken::new();
    let (background, supervisor) = BackgroundTasks::start(cancel.child_token());

    let state = create_service_state(&cli.service, background).await?;
    let router = create_router(state, &cli.middleware);

    let served = server::serve(router, &cli.server, cancel.clone()).await;

    cancel.cancel();
    match supervisor.await {
        Ok(failures) => tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            failures,
            "Background supervisor stopped"
        ),
        Err(error) => tracing::warn!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "Background supervisor did not stop cleanly"
        ),
    }

    served
}

/// Connects to NATS and prepares downstream clients.
async fn create_service_state(
    config: &ServiceConfig,
    background: BackgroundTasks,
) -> anyhow::Result<ServiceState> {
    ServiceState::from_config(config, background)
        .await
        .context("failed to create service state")
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS, body limits, security headers
/// 4. Routes (innermost) - auth gates and handlers
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes(state.clone())
        .with_state(state)
        .with_security(&middleware.cors, &SecurityHeadersConfig::default())
        .with_observability()
        .with_recovery(&middleware.recovery)
}
