//! Server error types with recovery suggestions.

use std::io;

use thiserror::Error;

/// Result type for server operations.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Errors raised while binding or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Runtime server error.
    #[error("Runtime error: {0}")]
    Runtime(#[source] io::Error),
}

impl ServerError {
    /// Creates a bind error with address context.
    pub fn bind_error(address: impl ToString, source: io::Error) -> Self {
        Self::BindError {
            address: address.to_string(),
            source,
        }
    }

    /// Returns a unique error code for this error type.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BindError { .. } => "E001",
            Self::Runtime(_) => "E002",
        }
    }

    /// Provides a human-readable suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        let kind = match self {
            Self::BindError { source, .. } | Self::Runtime(source) => source.kind(),
        };

        match kind {
            io::ErrorKind::PermissionDenied => {
                Some("Try using a port above 1024 or run with appropriate privileges")
            }
            io::ErrorKind::AddrInUse => Some(
                "The port is already in use. Try a different port or stop the conflicting service",
            ),
            io::ErrorKind::AddrNotAvailable => {
                Some("The address is not available. Check network interface configuration")
            }
            _ => None,
        }
    }
}
