//! Extra routes merged into the main router.

use axum::Router;

use crate::service::ServiceState;

/// Transformation applied to a router around the authentication layer.
pub type RouterMapFn = fn(Router<ServiceState>) -> Router<ServiceState>;

/// Routes an embedding binary adds next to the built-in ones.
///
/// Private routes sit behind the session check, public routes do not.
///
/// ```rust,ignore
/// use fileblobs_server::handler::CustomRoutes;
///
/// let custom = CustomRoutes::new()
///     .with_private_routes(some_private_router)
///     .with_public_routes(some_public_router);
/// ```
#[derive(Default, Clone)]
pub struct CustomRoutes {
    pub private_routes: Option<Router<ServiceState>>,
    pub public_routes: Option<Router<ServiceState>>,
    /// Applied to the private routes before the session check wraps them.
    pub private_before_middleware: Option<RouterMapFn>,
}

impl CustomRoutes {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the private routes.
    pub fn with_private_routes(mut self, routes: Router<ServiceState>) -> Self {
        self.private_routes = Some(routes);
        self
    }

    /// Sets the public routes.
    pub fn with_public_routes(mut self, routes: Router<ServiceState>) -> Self {
        self.public_routes = Some(routes);
        self
    }

    /// Sets the map applied to private routes before the session check.
    pub fn with_private_before_middleware(mut self, map: RouterMapFn) -> Self {
        self.private_before_middleware = Some(map);
        self
    }
}
