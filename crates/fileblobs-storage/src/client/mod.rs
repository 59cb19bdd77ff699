//! Storage client bound to a single identity.

mod listing;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use opendal::Operator;

pub use self::listing::ListingResult;
use crate::TRACING_TARGET;
use crate::error::{StorageError, StorageResult};
use crate::identity::StorageIdentity;
use crate::key;

/// Root path as understood by the backing operator.
const ROOT: &str = "/";

/// Producer of object bytes by key.
///
/// Archive assembly only needs this seam, so it can run against a live
/// client or an in-memory stand-in.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Retrieves the full content of `key`.
    async fn fetch(&self, key: &str) -> StorageResult<Bytes>;
}

/// Client for one storage account container.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, derive_more::Debug)]
pub struct StorageClient {
    identity: StorageIdentity,
    #[debug(skip)]
    operator: Operator,
}

impl StorageClient {
    /// Creates a new client over an already configured operator.
    pub fn new(identity: StorageIdentity, operator: Operator) -> Self {
        Self { identity, operator }
    }

    /// Returns the identity this client is bound to.
    pub fn identity(&self) -> &StorageIdentity {
        &self.identity
    }

    /// Returns the underlying operator.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Lists the immediate children of `prefix`.
    ///
    /// The prefix is normalized first, so `docs`, `docs/` and `/docs` all
    /// list the same level. A failing page fails the whole call.
    pub async fn list_children(&self, prefix: &str) -> StorageResult<ListingResult> {
        let prefix = key::normalize_prefix(prefix);

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %prefix,
            "Listing children"
        );

        let lister = self
            .operator
            .lister_with(list_path(&prefix))
            .await
            .map_err(|err| StorageError::listing(&prefix, err))?;

        let entries = lister.map_ok(|entry| entry.path().to_owned());
        let listing = ListingResult::project(&prefix, entries).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %prefix,
            folders = listing.folders.len(),
            files = listing.files.len(),
            "Listing complete"
        );

        Ok(listing)
    }

    /// Lists every object key under `prefix` at any depth.
    ///
    /// Directory markers are dropped. Keys are returned in backend order.
    pub async fn list_all_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = key::normalize_prefix(prefix);

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %prefix,
            "Listing recursively"
        );

        let lister = self
            .operator
            .lister_with(list_path(&prefix))
            .recursive(true)
            .await
            .map_err(|err| StorageError::listing(&prefix, err))?;

        let entries = lister.map_ok(|entry| entry.path().to_owned());
        let keys = listing::collect_keys(&prefix, entries).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %prefix,
            count = keys.len(),
            "Recursive listing complete"
        );

        Ok(keys)
    }

    /// Lists every object key under folders matching `folder`.
    ///
    /// See [`key::folder_pattern`] for the matching rules.
    pub async fn list_matching(&self, folder: &str) -> StorageResult<Vec<String>> {
        let pattern = key::folder_pattern(folder)?;
        let keys = self.list_all_under("").await?;

        Ok(keys
            .into_iter()
            .filter(|key| pattern.is_match(key))
            .collect())
    }

    /// Retrieves the full content of one object.
    ///
    /// The key is normalized before the request; directory markers and
    /// empty keys are rejected without touching the backend.
    pub async fn fetch(&self, key: &str) -> StorageResult<Bytes> {
        let key = object_key(key)?;

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            "Fetching object"
        );

        let buffer = self
            .operator
            .read(&key)
            .await
            .map_err(|err| StorageError::fetch(&key, err))?;
        let data = buffer.to_bytes();

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            size = data.len(),
            "Fetch complete"
        );

        Ok(data)
    }

    /// Writes one object, replacing any existing content.
    pub async fn upload(&self, key: &str, data: Bytes) -> StorageResult<String> {
        let key = object_key(key)?;
        let size = data.len();

        self.operator
            .write(&key, data)
            .await
            .map_err(|err| StorageError::upload(&key, err))?;

        tracing::info!(
            target: TRACING_TARGET,
            key = %key,
            size,
            "Object uploaded"
        );

        Ok(key)
    }

    /// Writes each file under `prefix` using the base name of its client
    /// supplied name. Stops at the first failure.
    pub async fn upload_many<I>(&self, prefix: &str, files: I) -> StorageResult<Vec<String>>
    where
        I: IntoIterator<Item = (String, Bytes)>,
    {
        let prefix = key::normalize_prefix(prefix);
        let mut keys = Vec::new();

        for (name, data) in files {
            let name = key::basename(&name);
            if name.is_empty() {
                return Err(StorageError::invalid_input("uploaded file has no name"));
            }
            keys.push(self.upload(&format!("{prefix}{name}"), data).await?);
        }

        Ok(keys)
    }
}

#[async_trait]
impl BlobSource for StorageClient {
    async fn fetch(&self, key: &str) -> StorageResult<Bytes> {
        StorageClient::fetch(self, key).await
    }
}

fn list_path(prefix: &str) -> &str {
    if prefix.is_empty() { ROOT } else { prefix }
}

fn object_key(raw: &str) -> StorageResult<String> {
    let key = key::normalize_key(raw);
    if key.is_empty() {
        return Err(StorageError::invalid_input("object key is required"));
    }
    if key::is_directory_marker(&key) {
        return Err(StorageError::invalid_input(format!(
            "'{key}' is a folder, not an object"
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClientFactory, OpendalFactory};

    async fn client() -> anyhow::Result<StorageClient> {
        let identity = StorageIdentity::new("acct", "a2V5", "docs");
        Ok(OpendalFactory::memory().connect(&identity).await?)
    }

    async fn seed(client: &StorageClient) -> anyhow::Result<()> {
        client.operator().create_dir("docs/").await?;
        client.operator().create_dir("docs/sub/").await?;
        client.upload("docs/a.txt", "alpha".into()).await?;
        client.upload("docs/sub/b.txt", "beta".into()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn lists_one_level_under_prefix() -> anyhow::Result<()> {
        let client = client().await?;
        seed(&client).await?;

        for prefix in ["docs/", "docs", "/docs"] {
            let listing = client.list_children(prefix).await?;
            assert_eq!(listing.folders, vec!["docs/sub"]);
            assert_eq!(listing.files, vec!["a.txt"]);
        }

        let root = client.list_children("").await?;
        assert_eq!(root.folders, vec!["docs"]);
        assert!(root.files.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_container_lists_nothing() -> anyhow::Result<()> {
        let client = client().await?;
        assert!(client.list_children("").await?.is_empty());
        assert!(client.list_all_under("").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn recursive_listing_drops_markers() -> anyhow::Result<()> {
        let client = client().await?;
        seed(&client).await?;
        client.upload("other/c.txt", "gamma".into()).await?;

        let mut keys = client.list_all_under("docs").await?;
        keys.sort();
        assert_eq!(keys, vec!["docs/a.txt", "docs/sub/b.txt"]);

        assert_eq!(client.list_all_under("").await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_normalizes_keys() -> anyhow::Result<()> {
        let client = client().await?;
        seed(&client).await?;

        for key in ["docs/sub/b.txt", "/docs/sub/b.txt", r"docs\sub\b.txt", "docs//sub/b.txt"] {
            assert_eq!(client.fetch(key).await?.as_ref(), b"beta");
        }
        Ok(())
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() -> anyhow::Result<()> {
        let client = client().await?;
        let error = client.fetch("missing.txt").await.err();
        assert!(error.is_some_and(|err| err.is_not_found()));

        let marker = client.fetch("docs/").await;
        assert!(matches!(marker, Err(StorageError::InvalidInput(_))));
        Ok(())
    }

    #[tokio::test]
    async fn upload_many_uses_base_names() -> anyhow::Result<()> {
        let client = client().await?;
        let files = vec![
            (r"C:\tmp\report.pdf".to_owned(), Bytes::from_static(b"pdf")),
            ("nested/notes.txt".to_owned(), Bytes::from_static(b"txt")),
        ];

        let keys = client.upload_many("inbox", files).await?;
        assert_eq!(keys, vec!["inbox/report.pdf", "inbox/notes.txt"]);
        assert_eq!(client.fetch("inbox/notes.txt").await?.as_ref(), b"txt");
        Ok(())
    }

    #[tokio::test]
    async fn list_matching_applies_folder_pattern() -> anyhow::Result<()> {
        let client = client().await?;
        client.upload("clients/acme/invoices/1.pdf", "1".into()).await?;
        client.upload("clients/globex/invoices/2.pdf", "2".into()).await?;
        client.upload("clients/globex/quotes/3.pdf", "3".into()).await?;

        let mut keys = client.list_matching("clients/*/invoices").await?;
        keys.sort();
        assert_eq!(
            keys,
            vec!["clients/acme/invoices/1.pdf", "clients/globex/invoices/2.pdf"]
        );
        Ok(())
    }
}
