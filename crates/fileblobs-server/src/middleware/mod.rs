//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Authentication and capability guards
//! - Security (CORS, body limits)
//! - Observability (request ids, tracing)
//! - Recovery (panics, timeouts)

mod auth;
mod observability;
mod recovery;
mod security;

pub use auth::{require_authentication, require_capability};
pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{CorsConfig, RouterSecurityExt};
