//! Application state and dependency injection.

use fileblobs_storage::{ClientCache, OpendalFactory};

use crate::service::{
    AccountRepository, IdentityKeys, RepositorySeed, Result, ServiceConfig, SessionStore,
    ZipBundler,
};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    client_factory: OpendalFactory,
    client_cache: ClientCache,
    repository: AccountRepository,
    sessions: SessionStore,
    identity_keys: IdentityKeys,
    zip_bundler: ZipBundler,
    service_config: ServiceConfig,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Opens (or seeds) the account repository and binds the client cache to
    /// the default account. No storage connection is made until the first
    /// request needs one. The cache and ad-hoc clients share one factory, so
    /// in-memory namespaces are shared too.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let seed = RepositorySeed {
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
            default_identity: config.default_identity(),
        };
        let repository = AccountRepository::open(config.repository_path(), seed).await?;

        let initial_identity = match repository.default_account().await {
            Some(record) => record.to_identity(),
            None => config.default_identity(),
        };

        let identity_keys = IdentityKeys::from_config(config).await?;

        let client_factory = config.client_factory();
        let service_state = Self {
            client_cache: ClientCache::with_identity(client_factory.clone(), initial_identity),
            client_factory,
            repository,
            sessions: SessionStore::new(config.session_ttl()),
            identity_keys,
            zip_bundler: ZipBundler::new(),
            service_config: config.clone(),
        };

        Ok(service_state)
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(client_factory: OpendalFactory);
impl_di!(client_cache: ClientCache);
impl_di!(repository: AccountRepository);
impl_di!(sessions: SessionStore);
impl_di!(identity_keys: IdentityKeys);
impl_di!(zip_bundler: ZipBundler);
impl_di!(service_config: ServiceConfig);
