//! URL-encoded form extractors.
//!
//! Backed by [`axum_extra::extract::Form`], so repeated fields such as
//! `files=a&files=b` deserialize into a `Vec`.

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum_extra::extract::{Form as ExtraForm, FormRejection};
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use super::{Json, extract_field_name_from_error, sanitize_error_message};
use crate::handler::{Error, ErrorKind};

/// Form extractor rejecting with [`Error`].
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Form<T>(pub T);

impl<T> Form<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for Form<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match ExtraForm::<T>::from_request(req, state).await {
            Ok(ExtraForm(form)) => Ok(Form(form)),
            Err(rejection) => Err(enhance_form_error(rejection)),
        }
    }
}

/// Accepts the same payload as a JSON body or as a form.
///
/// Bodies declared as `application/json` go through [`Json`]; everything
/// else is parsed as a form.
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct FormOrJson<T>(pub T);

impl<T> FormOrJson<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().starts_with("application/json"));

        if is_json {
            let Json(inner) = Json::<T>::from_request(req, state).await?;
            Ok(Self(inner))
        } else {
            let Form(inner) = Form::<T>::from_request(req, state).await?;
            Ok(Self(inner))
        }
    }
}

fn enhance_form_error(rejection: FormRejection) -> Error<'static> {
    tracing::debug!(
        target: "fileblobs_server::extract::form",
        error = %rejection,
        "Form data parsing failed"
    );

    match rejection {
        FormRejection::FailedToDeserializeForm(err) => {
            let error_message = err.to_string();
            if error_message.contains("missing field") {
                let field_name = extract_field_name_from_error(&error_message).unwrap_or("unknown");
                ErrorKind::BadRequest
                    .with_message("Missing required form field")
                    .with_context(format!("The form field '{field_name}' is required"))
            } else {
                ErrorKind::BadRequest
                    .with_message("Invalid form field value")
                    .with_context(sanitize_error_message(&error_message))
            }
        }
        other => ErrorKind::BadRequest
            .with_message("Invalid form submission")
            .with_context(sanitize_error_message(&other.to_string())),
    }
}
