//! Zip downloads: streamed folder and selection archives, and buffered
//! pattern archives over an ad-hoc connection string.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use fileblobs_storage::{
    ClientCache, ClientFactory, OpendalFactory, StorageClient, StorageError, StorageIdentity, key,
};

use super::request::{DownloadMultiple, DownloadZip, PathQuery};
use super::utils::attachment;
use crate::extract::{Capability, Form, Query, ValidateJson};
use crate::handler::{ErrorKind, Result};
use crate::middleware::require_capability;
use crate::service::{BundlePlan, BundleReport, ServiceState, ZipBundler};

/// Tracing target for archive downloads.
const TRACING_TARGET: &str = "fileblobs_server::handler::archives";

const FOLDER_ARCHIVE_NAME: &str = "folder.zip";
const SELECTION_ARCHIVE_NAME: &str = "files.zip";
const PATTERN_ARCHIVE_NAME: &str = "download.zip";

fn zip_headers(filename: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(header::CONTENT_DISPOSITION, attachment(filename));
    headers
}

/// Streams `plan` out of `client` as the response body.
fn stream_archive(
    zip_bundler: &ZipBundler,
    plan: BundlePlan,
    client: StorageClient,
    filename: &str,
) -> impl IntoResponse + use<> {
    let report = BundleReport::default();
    let stream = zip_bundler.stream(plan, Arc::new(client), report);
    (zip_headers(filename), Body::from_stream(stream))
}

/// Streams every object under a folder, with paths relative to it.
#[tracing::instrument(skip_all, fields(path = %request.path))]
async fn download_folder(
    State(client_cache): State<ClientCache>,
    State(zip_bundler): State<ZipBundler>,
    Query(request): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    let prefix = key::normalize_prefix(&request.path);
    if prefix.is_empty() {
        return Err(ErrorKind::BadRequest
            .with_message("Folder path is required")
            .with_resource("path"));
    }

    let client = client_cache.get_client().await?;
    let keys = client.list_all_under(&prefix).await?;
    let plan = BundlePlan::folder(&prefix, keys);
    if plan.is_empty() {
        return Err(StorageError::empty_result(plan.scope()).into());
    }

    tracing::info!(
        target: TRACING_TARGET,
        prefix = %prefix,
        entries = plan.len(),
        "Streaming folder archive"
    );

    Ok(stream_archive(&zip_bundler, plan, client, FOLDER_ARCHIVE_NAME))
}

/// Streams the selected objects, with paths relative to the listing prefix.
#[tracing::instrument(skip_all, fields(count = request.files.len()))]
async fn download_multiple(
    State(client_cache): State<ClientCache>,
    State(zip_bundler): State<ZipBundler>,
    Form(request): Form<DownloadMultiple>,
) -> Result<impl IntoResponse> {
    let prefix = key::normalize_prefix(&request.prefix);
    let files: Vec<String> = request
        .files
        .iter()
        .map(|file| key::normalize_key(file))
        .filter(|file| !file.is_empty() && !key::is_directory_marker(file))
        .collect();

    if files.is_empty() {
        return Err(ErrorKind::BadRequest
            .with_message("No files selected")
            .with_resource("files"));
    }

    let client = client_cache.get_client().await?;
    let plan = BundlePlan::selection(&prefix, files);

    tracing::info!(
        target: TRACING_TARGET,
        prefix = %prefix,
        entries = plan.len(),
        "Streaming selection archive"
    );

    Ok(stream_archive(&zip_bundler, plan, client, SELECTION_ARCHIVE_NAME))
}

/// Builds an archive of every key under a folder pattern of an arbitrary
/// account, addressed by connection string.
#[tracing::instrument(skip_all, fields(container = %request.container_name, folder = %request.folder_path))]
async fn download_zip(
    State(client_factory): State<OpendalFactory>,
    State(zip_bundler): State<ZipBundler>,
    ValidateJson(request): ValidateJson<DownloadZip>,
) -> Result<impl IntoResponse> {
    let identity =
        StorageIdentity::from_connection_string(&request.connection_string, &request.container_name)?;
    identity.validate().map_err(|err| {
        ErrorKind::BadRequest
            .with_message("Connection string is incomplete")
            .with_resource("connectionString")
            .with_context(err.to_string())
    })?;

    let client = client_factory.connect(&identity).await?;
    let keys = client.list_matching(&request.folder_path).await?;
    let plan = BundlePlan::full_keys(format!("pattern '{}'", request.folder_path), keys);
    let (archive, report) = zip_bundler.buffer(plan, &client).await?;

    tracing::info!(
        target: TRACING_TARGET,
        account = %identity.account_name,
        written = report.written(),
        skipped = report.skipped(),
        size = archive.len(),
        "Built pattern archive"
    );

    let mut headers = zip_headers(PATTERN_ARCHIVE_NAME);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(archive.len()));
    Ok((headers, archive))
}

/// Returns a [`Router`] with the archive routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/download-folder", get(download_folder))
        .route("/download-multiple", post(download_multiple))
        .route("/download-zip", post(download_zip))
        .route_layer(from_fn_with_state(Capability::Download, require_capability))
}
