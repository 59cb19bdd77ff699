use serde::{Deserialize, Serialize};

use super::{Capabilities, Role};

/// How a principal signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthSource {
    /// Username and password from the account repository.
    Local,
    /// Identity token from the upstream provider.
    Oidc,
}

/// The signed-in user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable identifier: the local username or the token subject.
    pub subject: String,
    /// Name shown to the user.
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub source: AuthSource,
}

impl Principal {
    /// Creates a principal for a local user.
    pub fn local(username: impl Into<String>, is_admin: bool) -> Self {
        let username = username.into();
        let roles = if is_admin {
            vec![Role::Administrator]
        } else {
            Vec::new()
        };

        Self {
            subject: username.clone(),
            display_name: username,
            email: None,
            roles,
            is_admin,
            source: AuthSource::Local,
        }
    }

    /// Returns the capabilities this principal holds.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_principal(self.is_admin)
    }
}
