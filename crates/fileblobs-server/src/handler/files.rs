//! Folder listings, single-object downloads and uploads.

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef, Multipart, State};
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use bytes::Bytes;
use fileblobs_storage::{ClientCache, key};

use super::request::{ListFiles, PathQuery};
use super::response::{Listing, Uploaded};
use super::utils::attachment;
use crate::extract::{AuthState, Capability, Json, Query};
use crate::handler::{Error, ErrorKind, Result};
use crate::middleware::require_capability;
use crate::service::{ServiceConfig, ServiceState};

/// Tracing target for file operations.
const TRACING_TARGET: &str = "fileblobs_server::handler::files";

/// Lists the folders and files directly under a prefix.
#[tracing::instrument(skip_all, fields(prefix = %request.prefix))]
async fn list_files(
    State(client_cache): State<ClientCache>,
    Query(request): Query<ListFiles>,
) -> Result<Json<Listing>> {
    let prefix = key::normalize_prefix(&request.prefix);
    let client = client_cache.get_client().await?;
    let listing = client.list_children(&prefix).await?.filter(&request.q);

    tracing::debug!(
        target: TRACING_TARGET,
        folders = listing.folders.len(),
        files = listing.files.len(),
        query = %request.q,
        "Listed folder"
    );

    Ok(Json(Listing::new(prefix, request.q, listing)))
}

/// Downloads one object as an attachment.
#[tracing::instrument(skip_all, fields(path = %request.path))]
async fn download_file(
    State(client_cache): State<ClientCache>,
    Query(request): Query<PathQuery>,
) -> Result<(HeaderMap, Bytes)> {
    let path = key::normalize_key(&request.path);
    if path.is_empty() {
        return Err(ErrorKind::BadRequest
            .with_message("Path is required")
            .with_resource("path"));
    }

    let client = client_cache.get_client().await?;
    let data = client.fetch(&path).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_DISPOSITION, attachment(key::basename(&path)));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));

    tracing::info!(
        target: TRACING_TARGET,
        key = %path,
        size = data.len(),
        "Object downloaded"
    );

    Ok((headers, data))
}

/// Uploads the `files` parts of a multipart form under its `prefix` part.
#[tracing::instrument(skip_all, fields(subject = %auth_state.subject))]
async fn upload_files(
    State(client_cache): State<ClientCache>,
    auth_state: AuthState,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Uploaded>)> {
    let mut prefix = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("prefix") => {
                prefix = field.text().await.map_err(multipart_error)?;
            }
            Some("files") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let data = field.bytes().await.map_err(multipart_error)?;
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                files.push((file_name, data));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ErrorKind::BadRequest
            .with_message("No files uploaded")
            .with_context("The request contained no 'files' parts"));
    }

    let prefix = key::normalize_prefix(&prefix);
    let client = client_cache.get_client().await?;
    let keys = client.upload_many(&prefix, files).await?;

    tracing::info!(
        target: TRACING_TARGET,
        prefix = %prefix,
        count = keys.len(),
        "Files uploaded"
    );

    Ok((StatusCode::CREATED, Json(Uploaded { prefix, keys })))
}

fn multipart_error(err: MultipartError) -> Error<'static> {
    tracing::debug!(target: TRACING_TARGET, error = %err, "Failed to read multipart body");

    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::PayloadTooLarge.into_error()
    } else {
        ErrorKind::BadRequest
            .with_message("Invalid multipart data")
            .with_context(err.body_text())
    }
}

/// Returns a [`Router`] with the listing, download and upload routes.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    let service_config = ServiceConfig::from_ref(&state);

    let browse = Router::new()
        .route("/files", get(list_files))
        .route_layer(from_fn_with_state(Capability::Browse, require_capability));

    let download = Router::new()
        .route("/download", get(download_file))
        .route_layer(from_fn_with_state(Capability::Download, require_capability));

    let upload = Router::new()
        .route("/upload", post(upload_files))
        .layer(DefaultBodyLimit::max(service_config.max_upload_size))
        .route_layer(from_fn_with_state(Capability::Upload, require_capability));

    browse.merge(download).merge(upload)
}

#[cfg(test)]
mod tests {
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;

    use super::*;
    use crate::handler::test::{create_test_context, create_test_context_with};

    #[tokio::test]
    async fn lists_one_level_with_filter() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        context
            .seed(&[
                ("docs/a.txt", b"a"),
                ("docs/sub/b.txt", b"b"),
                ("readme.md", b"r"),
            ])
            .await?;
        let cookie = context.login_admin().await;

        let root: Value = context.server.get("/files").add_cookie(cookie.clone()).await.json();
        assert_eq!(root["prefix"], "");
        assert_eq!(root["folders"], serde_json::json!(["docs"]));
        assert_eq!(root["files"], serde_json::json!(["readme.md"]));

        let docs: Value = context
            .server
            .get("/files?prefix=docs")
            .add_cookie(cookie.clone())
            .await
            .json();
        assert_eq!(docs["prefix"], "docs/");
        assert_eq!(docs["folders"], serde_json::json!(["docs/sub"]));
        assert_eq!(docs["files"], serde_json::json!(["a.txt"]));

        let filtered: Value = context
            .server
            .get("/files?q=READ")
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(filtered["folders"], serde_json::json!([]));
        assert_eq!(filtered["files"], serde_json::json!(["readme.md"]));
        Ok(())
    }

    #[tokio::test]
    async fn downloads_object_as_attachment() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        context.seed(&[("docs/report.pdf", b"%PDF")]).await?;
        let cookie = context.login_admin().await;

        let response = context
            .server
            .get("/download?path=docs/report.pdf")
            .add_cookie(cookie.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "application/octet-stream");
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "attachment; filename=\"report.pdf\""
        );
        assert_eq!(response.as_bytes().as_ref(), b"%PDF");

        context
            .server
            .get("/download?path=docs/missing.pdf")
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);

        context
            .server
            .get("/download")
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn uploads_under_prefix_using_base_names() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        let form = MultipartForm::new()
            .add_text("prefix", "inbox")
            .add_part("files", Part::bytes(b"one".as_slice()).file_name("C:\\tmp\\one.txt"))
            .add_part("files", Part::bytes(b"two".as_slice()).file_name("two.txt"));

        let response = context
            .server
            .post("/upload")
            .add_cookie(cookie)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["keys"], serde_json::json!(["inbox/one.txt", "inbox/two.txt"]));

        let client = context.client().await?;
        assert_eq!(client.fetch("inbox/one.txt").await?.as_ref(), b"one");
        Ok(())
    }

    #[tokio::test]
    async fn upload_without_files_is_rejected() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        let form = MultipartForm::new().add_text("prefix", "inbox");
        context
            .server
            .post("/upload")
            .add_cookie(cookie)
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() -> anyhow::Result<()> {
        let context = create_test_context_with(|config| config.max_upload_size = 64).await?;
        let cookie = context.login_admin().await;

        let form = MultipartForm::new()
            .add_part("files", Part::bytes(vec![b'x'; 1024]).file_name("big.bin"));
        let response = context
            .server
            .post("/upload")
            .add_cookie(cookie)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        Ok(())
    }
}
