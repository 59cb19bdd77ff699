//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, log format
//! ├── middleware: MiddlewareConfig  # CORS, request timeout
//! └── service: ServiceConfig        # Storage account, repository, sessions
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

mod middleware;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
use fileblobs_server::service::ServiceConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::{LogFormat, ServerConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "fileblobs")]
#[command(about = "Web file browser for Azure Blob Storage")]
#[command(version)]
pub struct Cli {
    /// Server network configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Storage, repository and session configuration.
    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Loads `.env` (if enabled) and parses CLI arguments.
    ///
    /// The `.env` file is read first so clap's `env` lookups see its values.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with `RUST_LOG` filtering in the configured format.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        match self.server.log_format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
                .init(),
            LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        }
    }

    /// Validates all configuration groups.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        Ok(())
    }

    /// Logs configuration without secrets.
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            backend = %self.service.storage_backend,
            account = %self.service.azure_account_name,
            container = %self.service.azure_container,
            data_dir = %self.service.data_dir.display(),
            session_ttl_secs = self.service.session_ttl,
            max_upload_size = self.service.max_upload_size,
            "Service configuration"
        );
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
