//! Storage error to HTTP error conversion implementation.

use fileblobs_storage::StorageError;

use super::http_error::{Error as HttpError, ErrorKind};

/// Tracing target for storage error conversions.
const TRACING_TARGET: &str = "fileblobs_server::handler::storage";

/// Hint attached to listing and credential failures.
const ACCOUNT_HINT: &str = "The selected storage account may be invalid or unreachable; select another account";

impl From<StorageError> for HttpError<'static> {
    fn from(error: StorageError) -> Self {
        let not_found = error.is_not_found();

        match &error {
            StorageError::InvalidInput(_) | StorageError::EmptyResult { .. } => {
                tracing::debug!(target: TRACING_TARGET, error = %error, "Storage request rejected");
            }
            StorageError::Fetch { .. } if not_found => {
                tracing::debug!(target: TRACING_TARGET, error = %error, "Object not found");
            }
            StorageError::Configuration { .. } | StorageError::Credential { .. } => {
                tracing::error!(target: TRACING_TARGET, error = %error, "Storage identity unusable");
            }
            _ => {
                tracing::warn!(target: TRACING_TARGET, error = %error, "Storage operation failed");
            }
        }

        match error {
            StorageError::Configuration { missing } => ErrorKind::InternalServerError
                .with_message("Storage account is not configured")
                .with_context(format!("Missing: {}. {ACCOUNT_HINT}", missing.join(", "))),

            StorageError::Credential { reason, .. } => ErrorKind::InternalServerError
                .with_message("Storage credentials were rejected")
                .with_context(format!("{reason}. {ACCOUNT_HINT}")),

            StorageError::Listing { prefix, .. } => ErrorKind::InternalServerError
                .with_message("Failed to list blobs")
                .with_resource("folder")
                .with_context(format!("Prefix '{prefix}'. {ACCOUNT_HINT}")),

            StorageError::Fetch { key, .. } if not_found => ErrorKind::NotFound
                .with_message("Object not found")
                .with_resource("blob")
                .with_context(key),

            StorageError::Fetch { key, .. } => ErrorKind::BadGateway
                .with_message("Failed to download object")
                .with_resource("blob")
                .with_context(key),

            StorageError::Upload { key, .. } => ErrorKind::InternalServerError
                .with_message("Failed to upload object")
                .with_resource("blob")
                .with_context(key),

            StorageError::EmptyResult { scope } => ErrorKind::NotFound
                .with_message("No files found")
                .with_context(scope),

            StorageError::InvalidInput(reason) => ErrorKind::BadRequest
                .with_message("Invalid input")
                .with_context(reason),

            StorageError::Archive(err) => ErrorKind::InternalServerError
                .with_message("Failed to create archive")
                .with_context(err.to_string()),
        }
    }
}
