//! Credential-switching client cache.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::TRACING_TARGET_CACHE;
use crate::backend::ClientFactory;
use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};
use crate::identity::StorageIdentity;

#[derive(Default)]
struct CacheState {
    identity: Option<StorageIdentity>,
    client: Option<StorageClient>,
}

/// Holds the active storage identity and the lazily built client for it.
///
/// A cached client is always bound to the identity that was active when it
/// was constructed, and is dropped whenever the identity changes. Concurrent
/// first callers trigger a single construction; identity swaps wait for an
/// in-flight construction to finish, so the next read sees the new identity.
#[derive(Clone)]
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    state: Arc<RwLock<CacheState>>,
}

impl ClientCache {
    /// Creates a new empty cache.
    pub fn new(factory: impl ClientFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            state: Arc::default(),
        }
    }

    /// Creates a new cache with an initial identity.
    pub fn with_identity(factory: impl ClientFactory, identity: StorageIdentity) -> Self {
        let cache = Self::new(factory);
        let state = CacheState {
            identity: Some(identity),
            client: None,
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            ..cache
        }
    }

    /// Returns the client for the active identity, building it on first use.
    pub async fn get_client(&self) -> StorageResult<StorageClient> {
        if let Some(client) = self.state.read().await.client.clone() {
            return Ok(client);
        }

        let mut state = self.state.write().await;
        if let Some(client) = state.client.clone() {
            return Ok(client);
        }

        let identity = state.identity.as_ref().ok_or_else(|| {
            StorageError::configuration(vec!["accountName", "accountKey", "containerName"])
        })?;
        identity.validate()?;

        tracing::debug!(
            target: TRACING_TARGET_CACHE,
            account = %identity.account_name,
            container = %identity.container_name,
            "Building storage client"
        );

        let client = self.factory.connect(identity).await.inspect_err(|err| {
            tracing::warn!(
                target: TRACING_TARGET_CACHE,
                error = %err,
                "Storage client construction failed"
            );
        })?;

        state.client = Some(client.clone());
        Ok(client)
    }

    /// Replaces the active identity and drops the cached client.
    pub async fn set_identity(&self, identity: StorageIdentity) {
        let mut state = self.state.write().await;

        tracing::info!(
            target: TRACING_TARGET_CACHE,
            account = %identity.account_name,
            container = %identity.container_name,
            "Storage identity switched"
        );

        state.identity = Some(identity);
        state.client = None;
    }

    /// Drops the cached client; the next call rebuilds it.
    pub async fn invalidate(&self) {
        self.state.write().await.client = None;
        tracing::debug!(target: TRACING_TARGET_CACHE, "Storage client invalidated");
    }
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use super::*;
    use crate::backend::OpendalFactory;

    /// Counts constructions and can hold them until released.
    #[derive(Clone, Default)]
    struct CountingFactory {
        inner: OpendalFactory,
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Semaphore>>,
        entered: Arc<Notify>,
        fail_first: Arc<AtomicUsize>,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                inner: OpendalFactory::memory(),
                ..Default::default()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn connect(&self, identity: &StorageIdentity) -> StorageResult<StorageClient> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();

            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }

            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::credential("transient failure"));
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.connect(identity).await
        }
    }

    fn identity(container: &str) -> StorageIdentity {
        StorageIdentity::new("acct", "a2V5", container)
    }

    #[tokio::test]
    async fn concurrent_callers_build_once() -> anyhow::Result<()> {
        let factory = CountingFactory::new();
        let cache = ClientCache::with_identity(factory.clone(), identity("a"));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_client().await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await??.identity().container_name, "a");
        }
        assert_eq!(factory.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn set_identity_drops_cached_client() -> anyhow::Result<()> {
        let factory = CountingFactory::new();
        let cache = ClientCache::with_identity(factory.clone(), identity("a"));

        assert_eq!(cache.get_client().await?.identity().container_name, "a");
        cache.set_identity(identity("b")).await;
        assert_eq!(cache.get_client().await?.identity().container_name, "b");
        assert_eq!(factory.calls(), 2);

        cache.invalidate().await;
        cache.get_client().await?;
        assert_eq!(factory.calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn switch_during_construction_wins() -> anyhow::Result<()> {
        let gate = Arc::new(Semaphore::new(0));
        let factory = CountingFactory::gated(gate.clone());
        let cache = ClientCache::with_identity(factory.clone(), identity("a"));

        let building = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_client().await }
        });
        factory.entered.notified().await;

        let switching = tokio::spawn({
            let cache = cache.clone();
            async move { cache.set_identity(identity("b")).await }
        });

        gate.add_permits(8);
        assert_eq!(building.await??.identity().container_name, "a");
        switching.await?;

        assert_eq!(cache.get_client().await?.identity().container_name, "b");
        Ok(())
    }

    #[tokio::test]
    async fn failed_construction_is_not_cached() -> anyhow::Result<()> {
        let factory = CountingFactory::new();
        factory.fail_first.store(1, Ordering::SeqCst);
        let cache = ClientCache::with_identity(factory.clone(), identity("a"));

        assert!(matches!(
            cache.get_client().await,
            Err(StorageError::Credential { .. })
        ));
        assert!(cache.get_client().await.is_ok());
        assert_eq!(factory.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_identity_is_a_configuration_error() {
        let factory = CountingFactory::new();
        let cache = ClientCache::new(factory.clone());
        assert!(matches!(
            cache.get_client().await,
            Err(StorageError::Configuration { .. })
        ));

        cache.set_identity(StorageIdentity::new("acct", "", "docs")).await;
        let Err(StorageError::Configuration { missing }) = cache.get_client().await else {
            panic!("expected a configuration error");
        };
        assert_eq!(missing, vec!["accountKey"]);
        assert_eq!(factory.calls(), 0);
    }
}
