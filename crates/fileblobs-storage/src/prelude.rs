//! Prelude module for convenient imports.

pub use crate::backend::{BackendKind, ClientFactory, OpendalFactory};
pub use crate::cache::ClientCache;
pub use crate::client::{BlobSource, ListingResult, StorageClient};
pub use crate::error::{StorageError, StorageResult};
pub use crate::identity::StorageIdentity;
