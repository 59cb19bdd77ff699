//! Session-backed authentication extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use derive_more::Deref;
use uuid::Uuid;

use super::{Capabilities, Capability, Principal};
use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};
use crate::service::SessionStore;

/// Name of the cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "session_id";

/// The principal behind the request's session cookie.
///
/// Resolved once per request; later extractions reuse the copy cached in
/// the request extensions.
#[derive(Debug, Clone, Deref, PartialEq, Eq)]
pub struct AuthState {
    session_id: Uuid,
    #[deref]
    principal: Principal,
    capabilities: Capabilities,
}

impl AuthState {
    /// Creates the state for a live session.
    pub fn new(session_id: Uuid, principal: Principal) -> Self {
        let capabilities = principal.capabilities();
        Self {
            session_id,
            principal,
            capabilities,
        }
    }

    /// Looks up the session named by the cookie jar.
    pub async fn from_cookies(jar: &CookieJar, sessions: &SessionStore) -> Result<Self> {
        let cookie = jar.get(SESSION_COOKIE).ok_or_else(|| {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                "Request carries no session cookie"
            );
            ErrorKind::MissingSession.into_error()
        })?;

        let session_id = Uuid::parse_str(cookie.value()).map_err(|_| {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                "Session cookie is not a session identifier"
            );
            ErrorKind::MissingSession.into_error()
        })?;

        let principal = sessions.get(session_id).await.ok_or_else(|| {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                %session_id,
                "Session is unknown or expired"
            );
            ErrorKind::MissingSession
                .with_message("Your session has expired")
                .with_context("Please sign in again to continue")
        })?;

        Ok(Self::new(session_id, principal))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Fails with `Forbidden` unless the principal holds `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        self.capabilities.require(capability).inspect_err(|_| {
            tracing::warn!(
                target: crate::TRACING_TARGET_AUTHORIZATION,
                subject = %self.principal.subject,
                capability = capability.as_ref(),
                "Capability check failed"
            );
        })
    }
}

impl<S> FromRequestParts<S> for AuthState
where
    S: Sync + Send + 'static,
    SessionStore: FromRef<S>,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth_state) = parts.extensions.get::<Self>() {
            return Ok(auth_state.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let sessions = SessionStore::from_ref(state);
        let auth_state = Self::from_cookies(&jar, &sessions).await?;

        parts.extensions.insert(auth_state.clone());
        Ok(auth_state)
    }
}
