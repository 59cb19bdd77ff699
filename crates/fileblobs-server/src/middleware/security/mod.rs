//! CORS and request body limits.

mod cors;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::limit::RequestBodyLimitLayer;

pub use self::cors::CorsConfig;

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Applies CORS and caps request bodies at `max_body_size` bytes.
    fn with_security(self, cors: &CorsConfig, max_body_size: usize) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, cors: &CorsConfig, max_body_size: usize) -> Self {
        self.layer(DefaultBodyLimit::max(max_body_size))
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(cors.layer())
    }
}
