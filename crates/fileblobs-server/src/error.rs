//! Service layer error types.
//!
//! Errors raised while bootstrapping the service state or touching the
//! account repository carry a kind, a message and an optional source. The
//! HTTP layer converts them into responses in `handler::error`.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use fileblobs_storage::StorageError;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for service layer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing service layer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Configuration-related errors.
    Config,
    /// Blob storage errors.
    Storage,
    /// Authentication and authorization errors.
    Auth,
    /// Requested record does not exist.
    NotFound,
    /// Record conflicts with existing state.
    Conflict,
    /// Record may not be modified.
    Immutable,
    /// File system operation errors.
    FileSystem,
    /// Internal service logic errors.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a string for categorization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Immutable => "immutable",
            Self::FileSystem => "file_system",
            Self::Internal => "internal_service",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service layer error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error to this error.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new configuration error.
    #[inline]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a new authentication error.
    #[inline]
    pub fn auth(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// Creates a new not found error.
    #[inline]
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a new conflict error.
    #[inline]
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates a new immutable record error.
    #[inline]
    pub fn immutable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Immutable, message)
    }

    /// Creates a new file system error.
    #[inline]
    pub fn file_system(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::FileSystem, message)
    }

    /// Creates a new internal service error.
    #[inline]
    pub fn internal(
        service: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        let service_name = service.into();
        let msg = message.into();
        Self::new(ErrorKind::Internal, format!("{service_name}: {msg}"))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::new(ErrorKind::Storage, err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let error = Error::config("invalid configuration");
        assert_eq!(error.kind(), ErrorKind::Config);
        assert_eq!(error.message(), "invalid configuration");
    }

    #[test]
    fn error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::file_system("cannot read auth.json").with_source(source);

        assert!(StdError::source(&error).is_some());
        assert_eq!(error.kind(), ErrorKind::FileSystem);
    }

    #[test]
    fn storage_error_conversion() {
        let error = Error::from(StorageError::invalid_input("bad connection string"));
        assert_eq!(error.kind(), ErrorKind::Storage);
        assert!(error.to_string().contains("bad connection string"));
    }

    #[test]
    fn error_kind_as_str() {
        assert_eq!(ErrorKind::Config.as_str(), "config");
        assert_eq!(ErrorKind::Conflict.as_str(), "conflict");
        assert_eq!(ErrorKind::Internal.as_str(), "internal_service");
    }
}
