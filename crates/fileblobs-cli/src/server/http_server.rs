//! HTTP server startup and lifecycle management.

use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::server::{Result, ServerError, shutdown_signal};
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Binds the configured address and serves `app` until a shutdown signal.
///
/// In-flight requests, streamed archives included, are allowed to finish.
pub async fn serve(app: Router, server_config: ServerConfig) -> Result<()> {
    let server_addr = server_config.server_addr();

    let listener = TcpListener::bind(server_addr).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %server_addr,
            error = %err,
            "Failed to bind to address"
        );
        ServerError::bind_error(server_addr, err)
    })?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "Server is ready and listening for connections"
    );

    if server_config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Server bound to all interfaces (0.0.0.0) - ensure firewall is configured"
        );
    }

    let start_time = Instant::now();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    let uptime_secs = start_time.elapsed().as_secs();

    match result {
        Ok(()) => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                uptime_secs,
                "Shutdown completed"
            );
            Ok(())
        }
        Err(err) => {
            let err = ServerError::Runtime(err);
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %err,
                error_code = err.error_code(),
                suggestion = err.suggestion(),
                uptime_secs,
                "Fatal error"
            );
            Err(err)
        }
    }
}
