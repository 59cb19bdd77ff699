//! CORS (Cross-Origin Resource Sharing) configuration.

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

/// Origins allowed when none are configured.
const LOCALHOST_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// Allowed origins; empty means local development origins.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,

    /// Whether browsers may send cookies cross-origin.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ALLOW_CREDENTIALS", default_value = "true")
    )]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Returns the configured origins that parse as header values.
    pub fn to_header_values(&self) -> Vec<HeaderValue> {
        if self.allowed_origins.is_empty() {
            LOCALHOST_ORIGINS
                .into_iter()
                .map(HeaderValue::from_static)
                .collect()
        } else {
            self.allowed_origins
                .iter()
                .filter_map(|origin| origin.trim().parse().ok())
                .collect()
        }
    }

    /// Builds the CORS layer.
    pub fn layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(self.to_header_values())
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_DISPOSITION])
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age())
    }
}
