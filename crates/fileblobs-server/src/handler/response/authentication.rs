use serde::Serialize;

use crate::extract::{AuthSource, Capabilities, Principal, Role};

/// The signed-in principal and what it may do.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    pub subject: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub source: AuthSource,
    pub capabilities: Capabilities,
}

impl From<Principal> for Me {
    fn from(principal: Principal) -> Self {
        Self {
            capabilities: principal.capabilities(),
            subject: principal.subject,
            display_name: principal.display_name,
            email: principal.email,
            roles: principal.roles,
            is_admin: principal.is_admin,
            source: principal.source,
        }
    }
}
