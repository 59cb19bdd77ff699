//! HTTP error handling with builder pattern for dynamic error responses.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::handler::response::ErrorResponse;

/// The error type for HTTP handlers in the server.
///
/// Carries a kind (which fixes the status code and default message) and
/// optional message, context and resource overrides.
#[derive(Clone)]
#[must_use = "errors do nothing unless serialized"]
pub struct Error<'a> {
    kind: ErrorKind,
    context: Option<Cow<'a, str>>,
    message: Option<Cow<'a, str>>,
    resource: Option<Cow<'a, str>>,
}

impl Error<'static> {
    /// Creates a new [`Error`] with the specified kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            message: None,
            resource: None,
        }
    }
}

impl<'a> Error<'a> {
    /// Attaches context information to the error.
    #[inline]
    pub fn with_context(self, context: impl Into<Cow<'a, str>>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    /// Sets a custom user-friendly message for the error.
    #[inline]
    pub fn with_message(self, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    /// Sets the resource that caused the error.
    #[inline]
    pub fn with_resource(self, resource: impl Into<Cow<'a, str>>) -> Self {
        Self {
            resource: Some(resource.into()),
            ..self
        }
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context if present.
    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the custom message if present.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the resource if present.
    #[inline]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Converts this error into a static version by cloning all borrowed data.
    pub fn into_static(self) -> Error<'static> {
        Error {
            kind: self.kind,
            context: self.context.map(|c| Cow::Owned(c.into_owned())),
            message: self.message.map(|m| Cow::Owned(m.into_owned())),
            resource: self.resource.map(|r| Cow::Owned(r.into_owned())),
        }
    }
}

impl Default for Error<'static> {
    #[inline]
    fn default() -> Self {
        Self::new(ErrorKind::default())
    }
}

impl fmt::Debug for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();

        let mut debug_struct = f.debug_struct("Error");
        debug_struct
            .field("kind", &self.kind)
            .field("name", &response.name)
            .field("status", &response.status);

        if let Some(ref context) = self.context {
            debug_struct.field("context", context);
        }

        if let Some(ref message) = self.message {
            debug_struct.field("custom_message", message);
        }

        if let Some(ref resource) = self.resource {
            debug_struct.field("custom_resource", resource);
        }

        debug_struct.finish()
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();
        let message = self.message.as_deref().unwrap_or(&response.message);

        write!(f, "{} ({}): {}", response.name, response.status, message)?;

        if let Some(ref context) = self.context {
            write!(f, " - {context}")?;
        }

        if let Some(ref resource) = self.resource {
            write!(f, " [resource: {resource}]")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error<'_> {}

impl IntoResponse for Error<'_> {
    fn into_response(self) -> Response {
        let mut response = self.kind.response();

        if let Some(message) = self.message {
            response = response.with_message(message);
        }

        if let Some(resource) = self.resource {
            response = response.with_resource(resource);
        }

        if let Some(context) = self.context {
            response = response.with_context(context);
        }

        response.into_response()
    }
}

impl From<ErrorKind> for Error<'static> {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// A specialized [`Result`] type for HTTP operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error<'static>> = std::result::Result<T, E>;

/// Every HTTP error the server can answer with.
#[must_use = "error kinds do nothing unless used to create errors"]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // 4xx Client Errors
    /// 400 Bad Request - Invalid request data
    BadRequest,
    /// 401 Unauthorized - No session cookie or an expired session
    MissingSession,
    /// 401 Unauthorized - Invalid credentials
    Unauthorized,
    /// 403 Forbidden - Missing capability
    Forbidden,
    /// 403 Forbidden - Identity token carries no recognized role
    AccessDenied,
    /// 404 Not Found - Resource not found
    NotFound,
    /// 409 Conflict - Conflicting resource state
    Conflict,
    /// 413 Payload Too Large - Upload exceeds the configured limit
    PayloadTooLarge,

    // 5xx Server Errors
    /// 500 Internal Server Error - Unexpected server error
    #[default]
    InternalServerError,
    /// 502 Bad Gateway - The storage backend failed
    BadGateway,
}

impl ErrorKind {
    /// Converts this error kind into a full [`Error`].
    #[inline]
    pub fn into_error(self) -> Error<'static> {
        Error::new(self)
    }

    /// Creates an [`Error`] with the specified context.
    #[inline]
    pub fn with_context<'a>(self, context: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_context(context)
    }

    /// Creates an [`Error`] with the specified message.
    #[inline]
    pub fn with_message<'a>(self, message: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_message(message)
    }

    /// Creates an [`Error`] with the specified resource.
    #[inline]
    pub fn with_resource<'a>(self, resource: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_resource(resource)
    }

    /// Returns the HTTP status code for this error kind.
    #[inline]
    pub fn status_code(self) -> StatusCode {
        self.response().status
    }

    /// Returns the default response for this error kind.
    #[inline]
    pub fn response(self) -> ErrorResponse<'static> {
        match self {
            Self::BadRequest => ErrorResponse::BAD_REQUEST,
            Self::MissingSession => ErrorResponse::MISSING_SESSION,
            Self::Unauthorized => ErrorResponse::UNAUTHORIZED,
            Self::Forbidden => ErrorResponse::FORBIDDEN,
            Self::AccessDenied => ErrorResponse::ACCESS_DENIED,
            Self::NotFound => ErrorResponse::NOT_FOUND,
            Self::Conflict => ErrorResponse::CONFLICT,
            Self::PayloadTooLarge => ErrorResponse::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => ErrorResponse::INTERNAL_SERVER_ERROR,
            Self::BadGateway => ErrorResponse::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response().name.as_ref())
    }
}

impl IntoResponse for ErrorKind {
    #[inline]
    fn into_response(self) -> Response {
        self.response().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_error() {
        let error = Error::default();
        assert_eq!(error.kind(), ErrorKind::InternalServerError);
        let _ = error.into_response();
    }

    #[test]
    fn error_builder_chaining() {
        let error = ErrorKind::NotFound
            .with_message("Object not found")
            .with_resource("blob")
            .with_context("docs/a.txt");

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.message(), Some("Object not found"));
        assert_eq!(error.resource(), Some("blob"));
        assert_eq!(error.context(), Some("docs/a.txt"));
    }

    #[test]
    fn std_fmt_display() {
        let error = ErrorKind::NotFound
            .with_message("Object not found")
            .with_resource("blob")
            .with_context("docs/a.txt");

        let display = error.to_string();
        assert!(display.contains("not_found"));
        assert!(display.contains("404"));
        assert!(display.contains("Object not found"));
        assert!(display.contains("docs/a.txt"));
    }

    #[test]
    fn error_into_static() {
        let context = String::from("borrowed context");
        let error = ErrorKind::BadRequest.with_context(context.as_str());
        let static_error = error.into_static();
        assert_eq!(static_error.context(), Some("borrowed context"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(ErrorKind::MissingSession.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ErrorKind::BadGateway.status_code(), StatusCode::BAD_GATEWAY);
    }
}
