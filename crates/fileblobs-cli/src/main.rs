#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use fileblobs_server::handler::{CustomRoutes, routes};
use fileblobs_server::middleware::{RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt};
use fileblobs_server::service::{ServiceConfig, ServiceState};

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "fileblobs_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "fileblobs_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "fileblobs_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    cli.init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting fileblobs server"
    );

    cli.log();
    cli.validate()?;

    let state = create_service_state(&cli.service).await?;
    let router = create_router(state, &cli.middleware, &cli.service);

    server::serve(router, cli.server).await?;
    Ok(())
}

/// Opens the account repository and binds the client cache.
async fn create_service_state(config: &ServiceConfig) -> anyhow::Result<ServiceState> {
    ServiceState::from_config(config)
        .await
        .context("failed to create service state")
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS and body limits
/// 4. Routes (innermost) - actual request handlers
fn create_router(
    state: ServiceState,
    middleware: &MiddlewareConfig,
    service: &ServiceConfig,
) -> Router {
    routes(CustomRoutes::new(), state.clone())
        .with_state(state)
        .with_security(&middleware.cors, service.max_upload_size)
        .with_observability()
        .with_recovery(&middleware.recovery)
}
