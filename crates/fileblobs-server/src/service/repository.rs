//! Account repository backed by `auth.json`.
//!
//! Users and the persisted storage accounts live in one JSON document.
//! Accounts added at runtime are kept in a volatile tier that is lost on
//! restart; the merged view lists persisted records first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileblobs_storage::StorageIdentity;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::service::{Error, Result};

/// Tracing target for repository operations.
const TRACING_TARGET: &str = "fileblobs_server::service::repository";

/// Name of the record seeded from the configured identity.
pub const DEFAULT_ACCOUNT_NAME: &str = "Default Account";

/// A local user allowed to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// A named set of storage credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Debug)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub account_name: String,
    #[debug(skip)]
    pub account_key: String,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl StorageAccountRecord {
    /// Builds a record from an identity.
    pub fn from_identity(
        name: impl Into<String>,
        description: impl Into<String>,
        identity: StorageIdentity,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            account_name: identity.account_name,
            account_key: identity.account_key,
            container_name: identity.container_name,
            endpoint: identity.endpoint,
        }
    }

    /// Returns the identity a client for this record is bound to.
    pub fn to_identity(&self) -> StorageIdentity {
        let identity = StorageIdentity::new(
            &self.account_name,
            &self.account_key,
            &self.container_name,
        );

        match &self.endpoint {
            Some(endpoint) => identity.with_endpoint(endpoint),
            None => identity,
        }
    }

    /// Returns `true` for the record seeded from configuration.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ACCOUNT_NAME
    }
}

/// On-disk layout of `auth.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthDocument {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    storage_accounts: Vec<StorageAccountRecord>,
}

/// Values used to populate a repository file that does not exist yet.
#[derive(Debug, Clone)]
pub struct RepositorySeed {
    pub admin_username: String,
    pub admin_password: String,
    pub default_identity: StorageIdentity,
}

#[derive(Debug, Default)]
struct RepositoryState {
    document: AuthDocument,
    volatile: Vec<StorageAccountRecord>,
}

impl RepositoryState {
    fn contains(&self, name: &str) -> bool {
        self.document
            .storage_accounts
            .iter()
            .chain(self.volatile.iter())
            .any(|record| record.name == name)
    }
}

/// Users and storage accounts shared by every request.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    path: Arc<PathBuf>,
    state: Arc<RwLock<RepositoryState>>,
}

impl AccountRepository {
    /// Loads the repository at `path`, creating it from `seed` if missing.
    pub async fn open(path: impl Into<PathBuf>, seed: RepositorySeed) -> Result<Self> {
        let path = path.into();

        let document = match tokio::fs::read(&path).await {
            Ok(contents) => serde_json::from_slice::<AuthDocument>(&contents).map_err(|err| {
                Error::config(format!("cannot parse '{}'", path.display())).with_source(err)
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let document = AuthDocument {
                    users: vec![UserRecord {
                        username: seed.admin_username,
                        password: seed.admin_password,
                        is_admin: true,
                    }],
                    storage_accounts: vec![StorageAccountRecord::from_identity(
                        DEFAULT_ACCOUNT_NAME,
                        "Configured storage account",
                        seed.default_identity,
                    )],
                };

                write_document(&path, &document).await?;
                tracing::info!(
                    target: TRACING_TARGET,
                    path = %path.display(),
                    "Created account repository"
                );
                document
            }
            Err(err) => {
                return Err(
                    Error::file_system(format!("cannot read '{}'", path.display()))
                        .with_source(err),
                );
            }
        };

        tracing::debug!(
            target: TRACING_TARGET,
            users = document.users.len(),
            accounts = document.storage_accounts.len(),
            "Loaded account repository"
        );

        Ok(Self {
            path: Arc::new(path),
            state: Arc::new(RwLock::new(RepositoryState {
                document,
                volatile: Vec::new(),
            })),
        })
    }

    /// Returns the file backing this repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns persisted records followed by non-colliding volatile ones.
    pub async fn list_accounts(&self) -> Vec<StorageAccountRecord> {
        let state = self.state.read().await;
        let persisted = &state.document.storage_accounts;

        let volatile = state
            .volatile
            .iter()
            .filter(|record| !persisted.iter().any(|p| p.name == record.name));

        persisted.iter().chain(volatile).cloned().collect()
    }

    /// Finds a record by name, preferring the volatile tier.
    pub async fn find_account(&self, name: &str) -> Option<StorageAccountRecord> {
        let state = self.state.read().await;
        state
            .volatile
            .iter()
            .chain(state.document.storage_accounts.iter())
            .find(|record| record.name == name)
            .cloned()
    }

    /// Returns the record seeded from configuration, if still present.
    pub async fn default_account(&self) -> Option<StorageAccountRecord> {
        self.find_account(DEFAULT_ACCOUNT_NAME).await
    }

    /// Adds a record to the volatile tier.
    ///
    /// A blank name is replaced by `Account <unix-seconds>`.
    pub async fn add_account(
        &self,
        mut record: StorageAccountRecord,
    ) -> Result<StorageAccountRecord> {
        let mut state = self.state.write().await;

        record.name = record.name.trim().to_owned();
        if record.name.is_empty() {
            record.name = generated_name(&state);
        } else if state.contains(&record.name) {
            return Err(Error::conflict(format!(
                "storage account '{}' already exists",
                record.name
            )));
        }

        tracing::info!(
            target: TRACING_TARGET,
            name = %record.name,
            account = %record.account_name,
            container = %record.container_name,
            "Added storage account"
        );

        state.volatile.push(record.clone());
        Ok(record)
    }

    /// Replaces the record named `original` in the tier that holds it.
    ///
    /// A blank name in `record` keeps the original name.
    pub async fn update_account(
        &self,
        original: &str,
        mut record: StorageAccountRecord,
    ) -> Result<StorageAccountRecord> {
        if original == DEFAULT_ACCOUNT_NAME {
            return Err(Error::immutable("the default storage account cannot be modified"));
        }

        let mut state = self.state.write().await;

        record.name = record.name.trim().to_owned();
        if record.name.is_empty() {
            record.name = original.to_owned();
        }

        if record.name != original && state.contains(&record.name) {
            return Err(Error::conflict(format!(
                "storage account '{}' already exists",
                record.name
            )));
        }

        if let Some(slot) = state.volatile.iter_mut().find(|r| r.name == original) {
            *slot = record.clone();
        } else if let Some(index) = state
            .document
            .storage_accounts
            .iter()
            .position(|r| r.name == original)
        {
            let mut document = state.document.clone();
            document.storage_accounts[index] = record.clone();
            write_document(&self.path, &document).await?;
            state.document = document;
        } else {
            return Err(Error::not_found(format!(
                "storage account '{original}' does not exist"
            )));
        }

        tracing::info!(
            target: TRACING_TARGET,
            original = %original,
            name = %record.name,
            "Updated storage account"
        );

        Ok(record)
    }

    /// Checks a username and password against the stored users.
    pub async fn authenticate(&self, username: &str, password: &str) -> Option<UserRecord> {
        let state = self.state.read().await;
        state
            .document
            .users
            .iter()
            .find(|user| user.username == username && user.password == password)
            .cloned()
    }

    /// Returns `true` if `username` is a stored administrator.
    pub async fn is_admin(&self, username: &str) -> bool {
        let state = self.state.read().await;
        state
            .document
            .users
            .iter()
            .any(|user| user.username == username && user.is_admin)
    }
}

fn generated_name(state: &RepositoryState) -> String {
    let base = format!("Account {}", jiff::Timestamp::now().as_second());
    if !state.contains(&base) {
        return base;
    }

    (2u32..)
        .map(|suffix| format!("{base} ({suffix})"))
        .find(|name| !state.contains(name))
        .unwrap_or(base)
}

/// Writes the document to a sibling temp file, then renames it into place.
async fn write_document(path: &Path, document: &AuthDocument) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            Error::file_system(format!("cannot create '{}'", parent.display())).with_source(err)
        })?;
    }

    let contents = serde_json::to_vec_pretty(document)
        .map_err(|err| Error::internal("repository", "cannot encode accounts").with_source(err))?;

    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, contents).await.map_err(|err| {
        Error::file_system(format!("cannot write '{}'", temp.display())).with_source(err)
    })?;
    tokio::fs::rename(&temp, path).await.map_err(|err| {
        Error::file_system(format!("cannot replace '{}'", path.display())).with_source(err)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;

    fn seed() -> RepositorySeed {
        RepositorySeed {
            admin_username: "admin".to_owned(),
            admin_password: "secret".to_owned(),
            default_identity: StorageIdentity::new("acct", "a2V5", "docs"),
        }
    }

    fn record(name: &str) -> StorageAccountRecord {
        StorageAccountRecord::from_identity(name, "", StorageIdentity::new("other", "a2V5", "c"))
    }

    #[tokio::test]
    async fn seeds_missing_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("auth.json");
        let repository = AccountRepository::open(&path, seed()).await?;

        assert!(path.exists());
        assert!(repository.authenticate("admin", "secret").await.is_some());
        assert!(repository.authenticate("admin", "wrong").await.is_none());
        assert!(repository.is_admin("admin").await);

        let default = repository.default_account().await;
        assert_eq!(default.map(|r| r.account_name), Some("acct".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn existing_file_is_not_reseeded() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("auth.json");
        tokio::fs::write(&path, r#"{"users":[{"username":"ann","password":"pw"}]}"#).await?;

        let repository = AccountRepository::open(&path, seed()).await?;
        assert!(repository.list_accounts().await.is_empty());
        assert!(repository.authenticate("ann", "pw").await.is_some());
        assert!(!repository.is_admin("ann").await);
        Ok(())
    }

    #[tokio::test]
    async fn added_accounts_are_volatile() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("auth.json");
        let repository = AccountRepository::open(&path, seed()).await?;

        repository.add_account(record("Reports")).await?;
        let names: Vec<_> = repository
            .list_accounts()
            .await
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec![DEFAULT_ACCOUNT_NAME, "Reports"]);

        let reopened = AccountRepository::open(&path, seed()).await?;
        assert!(reopened.find_account("Reports").await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_and_blank_names() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let repository = AccountRepository::open(dir.path().join("auth.json"), seed()).await?;

        let err = repository
            .add_account(record(DEFAULT_ACCOUNT_NAME))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let first = repository.add_account(record("  ")).await?;
        let second = repository.add_account(record("")).await?;
        assert!(first.name.starts_with("Account "));
        assert_ne!(first.name, second.name);
        Ok(())
    }

    #[tokio::test]
    async fn update_rules() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let repository = AccountRepository::open(dir.path().join("auth.json"), seed()).await?;
        repository.add_account(record("A")).await?;
        repository.add_account(record("B")).await?;

        let err = repository
            .update_account(DEFAULT_ACCOUNT_NAME, record("X"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Immutable);

        let err = repository.update_account("A", record("B")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = repository.update_account("Z", record("Z")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let updated = repository.update_account("A", record("")).await?;
        assert_eq!(updated.name, "A");

        repository.update_account("A", record("C")).await?;
        assert!(repository.find_account("A").await.is_none());
        assert!(repository.find_account("C").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn persisted_update_survives_reopen() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("auth.json");
        let contents = serde_json::json!({
            "users": [],
            "storageAccounts": [{
                "name": "Archive",
                "accountName": "old",
                "accountKey": "a2V5",
                "containerName": "c"
            }]
        });
        tokio::fs::write(&path, serde_json::to_vec(&contents)?).await?;

        let repository = AccountRepository::open(&path, seed()).await?;
        let mut changed = record("Archive");
        changed.account_name = "new".to_owned();
        repository.update_account("Archive", changed).await?;

        let reopened = AccountRepository::open(&path, seed()).await?;
        let archive = reopened.find_account("Archive").await;
        assert_eq!(archive.map(|r| r.account_name), Some("new".to_owned()));
        assert!(!path.with_extension("json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn failed_persisted_update_keeps_previous_record() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("auth.json");
        let contents = serde_json::json!({
            "users": [],
            "storageAccounts": [{
                "name": "Archive",
                "accountName": "old",
                "accountKey": "a2V5",
                "containerName": "c"
            }]
        });
        tokio::fs::write(&path, serde_json::to_vec(&contents)?).await?;
        let repository = AccountRepository::open(&path, seed()).await?;

        // A directory in place of the temp file makes the write fail.
        tokio::fs::create_dir(path.with_extension("json.tmp")).await?;

        let mut changed = record("Archive");
        changed.container_name = "changed".to_owned();
        let err = repository.update_account("Archive", changed).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileSystem);

        let archive = repository.find_account("Archive").await;
        assert_eq!(archive.map(|r| r.container_name), Some("c".to_owned()));
        Ok(())
    }

    #[test]
    fn debug_hides_account_key() {
        let record = record("A");
        assert!(!format!("{record:?}").contains("a2V5"));
    }
}
