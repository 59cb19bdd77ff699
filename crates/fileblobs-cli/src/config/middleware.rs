//! Middleware configuration for the HTTP server.
//!
//! ```bash
//! fileblobs --allowed-origins "https://files.example.com" --request-timeout 60
//! ```

use clap::Args;
use fileblobs_server::middleware::{CorsConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// CORS and recovery settings.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Which origins may call the API and whether they may send cookies.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Request timeout and panic recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Logs middleware configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            origins = ?self.cors.allowed_origins,
            credentials = self.cors.allow_credentials,
            "CORS configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            request_timeout_secs = self.recovery.request_timeout,
            "Recovery configuration"
        );
    }
}
