use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query as AxumQuery};
use axum::http::request::Parts;
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use super::{extract_field_name_from_error, sanitize_error_message};
use crate::handler::{Error, ErrorKind};

/// Drop-in replacement for [`axum::extract::Query`] rejecting with [`Error`].
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Query<T>(pub T);

impl<T> Query<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AxumQuery::<T>::from_request_parts(parts, state).await {
            Ok(AxumQuery(query)) => Ok(Query(query)),
            Err(rejection) => Err(enhance_query_error(rejection)),
        }
    }
}

fn enhance_query_error(rejection: QueryRejection) -> Error<'static> {
    tracing::debug!(
        target: "fileblobs_server::extract::query",
        error = %rejection,
        "Query parameter parsing failed"
    );

    let error_message = rejection.body_text();
    if error_message.contains("missing field") {
        let field_name = extract_field_name_from_error(&error_message).unwrap_or("unknown");
        ErrorKind::BadRequest
            .with_message("Missing required query parameter")
            .with_context(format!("The query parameter '{field_name}' is required"))
    } else {
        ErrorKind::BadRequest
            .with_message("Invalid query parameters")
            .with_context(sanitize_error_message(&error_message))
    }
}
