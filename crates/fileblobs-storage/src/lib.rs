#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod backend;
mod cache;
mod client;
mod error;
mod identity;
pub mod key;

#[doc(hidden)]
pub mod prelude;

pub use backend::{BackendKind, ClientFactory, OpendalFactory};
pub use cache::ClientCache;
pub use client::{BlobSource, ListingResult, StorageClient};
pub use error::{StorageError, StorageResult};
pub use identity::StorageIdentity;

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "fileblobs_storage";

/// Tracing target for the client cache.
pub const TRACING_TARGET_CACHE: &str = "fileblobs_storage::cache";
