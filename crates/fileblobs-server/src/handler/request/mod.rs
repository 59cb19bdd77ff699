//! Request bodies, forms and queries.

mod accounts;
mod authentication;
mod files;

pub use accounts::StorageAccountForm;
pub use authentication::{Login, StoreToken};
pub use files::{DownloadMultiple, DownloadZip, ListFiles, PathQuery};
