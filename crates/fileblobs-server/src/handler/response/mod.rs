//! Response bodies.

mod accounts;
mod authentication;
mod error_response;
mod files;
mod monitors;

pub use accounts::{StorageAccount, StorageAccounts};
pub use authentication::Me;
pub use error_response::ErrorResponse;
pub use files::{Listing, Uploaded};
pub use monitors::Health;
