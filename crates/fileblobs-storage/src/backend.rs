//! Storage backends and the factory that binds them to an identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opendal::layers::TimeoutLayer;
use opendal::{Operator, services};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::TRACING_TARGET;
use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};
use crate::identity::StorageIdentity;

/// Default per-operation timeout applied to every backend call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a [`StorageClient`] for an identity.
///
/// The [`ClientCache`](crate::ClientCache) calls this at most once per
/// identity; tests swap in counting or gated factories.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    /// Constructs a client bound to `identity`.
    async fn connect(&self, identity: &StorageIdentity) -> StorageResult<StorageClient>;
}

/// Supported storage backends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    /// Azure Blob Storage.
    #[default]
    #[serde(rename = "azblob")]
    #[strum(serialize = "azblob")]
    #[cfg_attr(feature = "config", value(name = "azblob"))]
    AzureBlob,
    /// In-process memory store, one namespace per account and container.
    Memory,
}

/// [`ClientFactory`] backed by OpenDAL operators.
#[derive(Clone)]
pub struct OpendalFactory {
    kind: BackendKind,
    timeout: Duration,
    memory: Arc<Mutex<HashMap<String, Operator>>>,
}

impl OpendalFactory {
    /// Creates a new factory for the given backend.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            timeout: DEFAULT_OPERATION_TIMEOUT,
            memory: Arc::default(),
        }
    }

    /// Creates a factory over the in-memory backend.
    pub fn memory() -> Self {
        Self::new(BackendKind::Memory)
    }

    /// Sets the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the backend kind.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    fn layered(&self, operator: Operator) -> Operator {
        operator.layer(TimeoutLayer::new().with_timeout(self.timeout))
    }

    async fn memory_operator(&self, identity: &StorageIdentity) -> StorageResult<Operator> {
        let namespace = format!("{}/{}", identity.account_name, identity.container_name);
        let mut operators = self.memory.lock().await;

        if let Some(operator) = operators.get(&namespace) {
            return Ok(operator.clone());
        }

        let operator = Operator::new(services::Memory::default())
            .map_err(|err| StorageError::credential_with_source("memory backend", err))?
            .finish();
        let operator = self.layered(operator);
        operators.insert(namespace, operator.clone());
        Ok(operator)
    }

    #[cfg(feature = "azblob")]
    fn azblob_operator(&self, identity: &StorageIdentity) -> StorageResult<Operator> {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        STANDARD
            .decode(identity.account_key.trim())
            .map_err(|err| StorageError::credential(format!("account key is not base64: {err}")))?;

        let endpoint = identity.endpoint();
        let builder = services::Azblob::default()
            .container(&identity.container_name)
            .account_name(&identity.account_name)
            .account_key(identity.account_key.trim())
            .endpoint(&endpoint);

        let operator = Operator::new(builder)
            .map_err(|err| StorageError::credential_with_source("azure blob client", err))?
            .finish();
        Ok(self.layered(operator))
    }

    #[cfg(not(feature = "azblob"))]
    fn azblob_operator(&self, _identity: &StorageIdentity) -> StorageResult<Operator> {
        Err(StorageError::credential(
            "azure blob backend is not enabled in this build",
        ))
    }
}

impl Default for OpendalFactory {
    fn default() -> Self {
        Self::new(BackendKind::default())
    }
}

#[async_trait]
impl ClientFactory for OpendalFactory {
    async fn connect(&self, identity: &StorageIdentity) -> StorageResult<StorageClient> {
        identity.validate()?;

        let operator = match self.kind {
            BackendKind::AzureBlob => self.azblob_operator(identity)?,
            BackendKind::Memory => self.memory_operator(identity).await?,
        };

        tracing::info!(
            target: TRACING_TARGET,
            backend = %self.kind,
            account = %identity.account_name,
            container = %identity.container_name,
            "Storage client constructed"
        );

        Ok(StorageClient::new(identity.clone(), operator))
    }
}

impl std::fmt::Debug for OpendalFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpendalFactory")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn backend_kind_names() -> anyhow::Result<()> {
        assert_eq!(BackendKind::AzureBlob.to_string(), "azblob");
        assert_eq!(BackendKind::Memory.as_ref(), "memory");
        assert_eq!(BackendKind::from_str("azblob")?, BackendKind::AzureBlob);
        assert_eq!(BackendKind::from_str("memory")?, BackendKind::Memory);
        Ok(())
    }

    #[tokio::test]
    async fn incomplete_identity_is_rejected() {
        let factory = OpendalFactory::memory();
        let result = factory.connect(&StorageIdentity::new("acct", "", "")).await;
        assert!(matches!(result, Err(StorageError::Configuration { .. })));
    }

    #[tokio::test]
    async fn memory_namespaces_survive_reconnects() -> anyhow::Result<()> {
        let factory = OpendalFactory::memory();
        let identity = StorageIdentity::new("acct", "a2V5", "docs");

        let first = factory.connect(&identity).await?;
        first.upload("a.txt", "hello".into()).await?;

        let second = factory.connect(&identity).await?;
        assert_eq!(second.fetch("a.txt").await?.as_ref(), b"hello");

        let other = factory
            .connect(&StorageIdentity::new("acct", "a2V5", "other"))
            .await?;
        assert!(other.fetch("a.txt").await.is_err());
        Ok(())
    }

    #[cfg(feature = "azblob")]
    #[tokio::test]
    async fn azblob_rejects_malformed_key() {
        let factory = OpendalFactory::new(BackendKind::AzureBlob);
        let identity = StorageIdentity::new("acct", "not base64 !!", "docs");
        let result = factory.connect(&identity).await;
        assert!(matches!(result, Err(StorageError::Credential { .. })));
    }

    #[cfg(feature = "azblob")]
    #[tokio::test]
    async fn azblob_builds_without_network() -> anyhow::Result<()> {
        let factory = OpendalFactory::new(BackendKind::AzureBlob);
        let identity = StorageIdentity::new("acct", "a2V5a2V5", "docs")
            .with_endpoint("http://127.0.0.1:10000/acct");
        let client = factory.connect(&identity).await?;
        assert_eq!(client.identity().container_name, "docs");
        Ok(())
    }
}
