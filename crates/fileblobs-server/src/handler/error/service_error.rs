//! Service error to HTTP error conversion implementation.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::error::{Error as ServiceError, ErrorKind as ServiceErrorKind};

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "fileblobs_server::handler::service";

impl From<ServiceError> for HttpError<'static> {
    fn from(error: ServiceError) -> Self {
        match error.kind() {
            ServiceErrorKind::NotFound
            | ServiceErrorKind::Conflict
            | ServiceErrorKind::Immutable
            | ServiceErrorKind::Auth => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Service request rejected"
                );
            }
            _ => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Service operation failed"
                );
            }
        }

        let message = error.message().to_owned();

        match error.kind() {
            ServiceErrorKind::NotFound => ErrorKind::NotFound.with_context(message),
            ServiceErrorKind::Conflict => ErrorKind::Conflict.with_context(message),
            ServiceErrorKind::Immutable => ErrorKind::Forbidden
                .with_message("This record cannot be modified")
                .with_context(message),
            ServiceErrorKind::Auth => ErrorKind::Unauthorized.with_context(message),
            ServiceErrorKind::Config | ServiceErrorKind::Storage => ErrorKind::InternalServerError
                .with_message("Invalid configuration")
                .with_context(message),
            ServiceErrorKind::FileSystem | ServiceErrorKind::Internal => {
                ErrorKind::InternalServerError.with_message("Internal error")
            }
        }
    }
}
