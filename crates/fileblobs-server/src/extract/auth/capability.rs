//! Roles and the capabilities they grant.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::handler::{ErrorKind, Result};

/// Role carried by an identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr)]
pub enum Role {
    Administrator,
    Consultant,
}

impl Role {
    /// Resolves a claim value by exact, case-insensitive name.
    pub fn from_claim(value: &str) -> Option<Self> {
        const ADMINISTRATOR: [&str; 2] = ["Administrator", "Admin"];
        const CONSULTANT: [&str; 2] = ["Consultant", "IdentityConsultant"];

        let value = value.trim();
        if ADMINISTRATOR.iter().any(|name| name.eq_ignore_ascii_case(value)) {
            Some(Self::Administrator)
        } else if CONSULTANT.iter().any(|name| name.eq_ignore_ascii_case(value)) {
            Some(Self::Consultant)
        } else {
            None
        }
    }
}

/// A single operation a principal may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(EnumIter, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Capability {
    /// List folders and files.
    Browse,
    /// Download single files and archives.
    Download,
    /// Upload files.
    Upload,
    /// Select the active storage account.
    SwitchAccount,
    /// Add and edit storage account records.
    ManageAccounts,
}

impl Capability {
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// The capabilities resolved for one principal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Capabilities every authenticated principal holds.
    pub const AUTHENTICATED: Self = Self::empty()
        .with(Capability::Browse)
        .with(Capability::Download)
        .with(Capability::Upload)
        .with(Capability::SwitchAccount);

    /// Capabilities of an administrator.
    pub const ADMINISTRATOR: Self = Self::AUTHENTICATED.with(Capability::ManageAccounts);

    /// Returns a set with no capabilities.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns this set with `capability` added.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Returns the set granted to an authenticated principal.
    pub const fn for_principal(is_admin: bool) -> Self {
        if is_admin {
            Self::ADMINISTRATOR
        } else {
            Self::AUTHENTICATED
        }
    }

    /// Returns `true` if `capability` is in the set.
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Fails with `Forbidden` unless `capability` is in the set.
    pub fn require(self, capability: Capability) -> Result<()> {
        if self.contains(capability) {
            return Ok(());
        }

        Err(ErrorKind::Forbidden
            .with_message("You are not allowed to perform this action")
            .with_context(format!("missing capability '{}'", capability.as_ref())))
    }

    /// Iterates over the capabilities in the set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::iter().filter(move |capability| self.contains(*capability))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
