//! Session and capability guards for protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::extract::{AuthState, Capability};
use crate::handler::{ErrorKind, Result};

/// Rejects requests without a live session.
///
/// The resolved [`AuthState`] stays in the request extensions for the
/// handlers and guards further down.
pub async fn require_authentication(
    _auth_state: AuthState,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

/// Rejects principals lacking the capability given as middleware state.
///
/// Must run inside [`require_authentication`].
pub async fn require_capability(
    State(capability): State<Capability>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let auth_state = request
        .extensions()
        .get::<AuthState>()
        .ok_or_else(|| ErrorKind::MissingSession.into_error())?;

    auth_state.require(capability)?;
    Ok(next.run(request).await)
}
