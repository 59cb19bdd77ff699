//! Storage error types.

use std::io;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Every variant carries enough context (key, prefix, underlying cause) for
/// the HTTP layer to choose a response; none of them is retried here.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The active storage identity is missing required fields.
    #[error("storage identity is incomplete, missing: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// The credential material could not be turned into a client.
    #[error("invalid storage credentials: {reason}")]
    Credential {
        reason: String,
        #[source]
        source: Option<opendal::Error>,
    },

    /// A listing page failed; no partial result is kept.
    #[error("listing failed under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: opendal::Error,
    },

    /// A single object could not be retrieved.
    #[error("fetch failed for '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: opendal::Error,
    },

    /// A single object could not be written.
    #[error("upload failed for '{key}': {source}")]
    Upload {
        key: String,
        #[source]
        source: opendal::Error,
    },

    /// A bundling request matched (or produced) no entries.
    #[error("no entries found for '{scope}'")]
    EmptyResult { scope: String },

    /// Caller-supplied input (connection string, folder pattern, key) is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The archive writer failed.
    #[error("archive assembly failed: {0}")]
    Archive(#[source] io::Error),
}

impl StorageError {
    /// Creates a new configuration error listing the missing fields.
    pub fn configuration(missing: Vec<&'static str>) -> Self {
        Self::Configuration { missing }
    }

    /// Creates a new credential error.
    pub fn credential(reason: impl Into<String>) -> Self {
        Self::Credential {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a new credential error caused by the backend.
    pub fn credential_with_source(reason: impl Into<String>, source: opendal::Error) -> Self {
        Self::Credential {
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Creates a new listing error.
    pub fn listing(prefix: impl Into<String>, source: opendal::Error) -> Self {
        Self::Listing {
            prefix: prefix.into(),
            source,
        }
    }

    /// Creates a new fetch error.
    pub fn fetch(key: impl Into<String>, source: opendal::Error) -> Self {
        Self::Fetch {
            key: key.into(),
            source,
        }
    }

    /// Creates a new upload error.
    pub fn upload(key: impl Into<String>, source: opendal::Error) -> Self {
        Self::Upload {
            key: key.into(),
            source,
        }
    }

    /// Creates a new empty result error.
    pub fn empty_result(scope: impl Into<String>) -> Self {
        Self::EmptyResult {
            scope: scope.into(),
        }
    }

    /// Creates a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a new archive error.
    pub fn archive(err: impl Into<io::Error>) -> Self {
        Self::Archive(err.into())
    }

    /// Returns `true` if the backend reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Fetch { source, .. } | Self::Listing { source, .. } => {
                source.kind() == opendal::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Returns `true` for an empty bundling result.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult { .. })
    }
}
