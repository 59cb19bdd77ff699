//! Application state and dependency injection.

mod compression;
mod config;
mod identity_keys;
mod repository;
mod session;
mod state;

pub use crate::service::compression::{BundleEntry, BundlePlan, BundleReport, ZipBundler};
pub use crate::service::config::ServiceConfig;
pub use crate::service::identity_keys::IdentityKeys;
pub use crate::service::repository::{
    AccountRepository, DEFAULT_ACCOUNT_NAME, RepositorySeed, StorageAccountRecord, UserRecord,
};
pub use crate::service::session::SessionStore;
pub use crate::service::state::ServiceState;
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};
