//! Identity token verification.
//!
//! Tokens issued by the external identity provider are decoded and checked
//! against the configured [`IdentityKeys`] before their subject, display name
//! and roles are trusted.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use serde::Deserialize;
use serde_json::Value;

use super::{AuthSource, Principal, Role};
use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};
use crate::service::IdentityKeys;

/// Display name used when the token names nobody.
const FALLBACK_DISPLAY_NAME: &str = "oidc_user";

/// A role claim: a single name, a list, or something unusable.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RoleClaim {
    One(String),
    Many(Vec<Value>),
    Other(Value),
}

impl RoleClaim {
    fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(items) => items.iter().filter_map(Value::as_str).collect(),
            Self::Other(_) => Vec::new(),
        }
    }
}

/// The payload fields read from an identity token.
#[derive(Debug, Clone, Default, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<RoleClaim>,
    #[serde(
        default,
        rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role"
    )]
    microsoft_role: Option<RoleClaim>,
    #[serde(default)]
    roles: Option<RoleClaim>,
    #[serde(default)]
    group: Option<RoleClaim>,
}

/// The identity carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: Option<String>,
    pub display_name: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
}

impl IdentityClaims {
    /// Verifies `token` against `keys` and reads its identity.
    pub fn decode(token: &str, keys: &IdentityKeys) -> Result<Self> {
        if !keys.is_enabled() {
            tracing::warn!(
                target: TRACING_TARGET_AUTHENTICATION,
                "Identity token received but token sign-in is disabled"
            );
            return Err(ErrorKind::Unauthorized
                .with_message("Identity token sign-in is not configured")
                .with_resource("authentication"));
        }

        let claims = keys.decode::<TokenClaims>(token.trim()).map_err(|err| {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                error = %err,
                "Identity token rejected"
            );
            Error::from(err)
        })?;

        Ok(Self::from_claims(claims))
    }

    fn from_claims(claims: TokenClaims) -> Self {
        fn text(value: Option<String>) -> Option<String> {
            value
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        }

        let email = text(claims.email);
        let display_name = text(claims.name)
            .or_else(|| text(claims.preferred_username))
            .or_else(|| email.clone())
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_owned());

        let mut roles = Vec::new();
        let names = [
            &claims.role,
            &claims.microsoft_role,
            &claims.roles,
            &claims.group,
        ]
        .into_iter()
        .flatten()
        .flat_map(RoleClaim::names);

        for role in names.filter_map(Role::from_claim) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Self {
            subject: text(claims.sub),
            display_name,
            email,
            roles,
        }
    }

    /// Converts the claims into a principal.
    ///
    /// Fails with `access_denied` when no recognized role is present.
    pub fn into_principal(self) -> Result<Principal> {
        if self.roles.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_AUTHENTICATION,
                subject = ?self.subject,
                "Identity token carries no recognized role"
            );
            return Err(ErrorKind::AccessDenied.into_error());
        }

        let is_admin = self.roles.contains(&Role::Administrator);
        Ok(Principal {
            subject: self.subject.unwrap_or_else(|| self.display_name.clone()),
            display_name: self.display_name,
            email: self.email,
            roles: self.roles,
            is_admin,
            source: AuthSource::Oidc,
        })
    }
}

impl From<JwtError> for Error<'static> {
    fn from(error: JwtError) -> Self {
        match error.kind() {
            JwtErrorKind::ExpiredSignature => ErrorKind::Unauthorized
                .with_message("Identity token has expired")
                .with_context("Please sign in again to continue"),
            JwtErrorKind::InvalidSignature => ErrorKind::Unauthorized
                .with_message("Identity token verification failed")
                .with_context("Token signature could not be verified"),
            JwtErrorKind::InvalidAudience => ErrorKind::Unauthorized
                .with_message("Identity token is not valid for this service")
                .with_context("Token was issued for a different application"),
            JwtErrorKind::InvalidIssuer => ErrorKind::Unauthorized
                .with_message("Identity token is from an untrusted issuer"),
            JwtErrorKind::ImmatureSignature => ErrorKind::Unauthorized
                .with_message("Identity token is not valid yet"),
            JwtErrorKind::InvalidAlgorithm => ErrorKind::Unauthorized
                .with_message("Identity token uses an unsupported algorithm"),
            JwtErrorKind::MissingRequiredClaim(claim) => ErrorKind::BadRequest
                .with_message("Invalid identity token")
                .with_context(format!("token is missing the '{claim}' claim")),
            JwtErrorKind::InvalidToken | JwtErrorKind::Base64(_) | JwtErrorKind::Utf8(_) => {
                ErrorKind::BadRequest
                    .with_message("Invalid identity token")
                    .with_context("token is not a compact JWT")
            }
            JwtErrorKind::Json(_) => ErrorKind::BadRequest
                .with_message("Invalid identity token")
                .with_context("payload is not a valid claims object"),
            _ => ErrorKind::InternalServerError
                .with_message("Identity token processing failed"),
        }
    }
}
