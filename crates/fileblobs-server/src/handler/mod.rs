//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use axum::Router;
//! use fileblobs_server::handler::{CustomRoutes, routes};
//! use fileblobs_server::service::{ServiceConfig, ServiceState};
//!
//! async fn custom_handler() -> &'static str {
//!     "Hello from custom route!"
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::default();
//! let state = ServiceState::from_config(&config).await?;
//!
//! let custom_routes = CustomRoutes::new()
//!     .with_private_routes(Router::new().route("/custom-private", get(custom_handler)))
//!     .with_public_routes(Router::new().route("/custom-public", get(custom_handler)));
//!
//! let router: Router = routes(custom_routes, state.clone()).with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod accounts;
mod archives;
mod authentication;
mod error;
mod files;
mod monitors;
mod request;
mod response;
mod utils;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::request::{
    DownloadMultiple, DownloadZip, ListFiles, Login, PathQuery, StorageAccountForm, StoreToken,
};
pub use crate::handler::response::{
    ErrorResponse, Health, Listing, Me, StorageAccount, StorageAccounts, Uploaded,
};
pub use crate::handler::utils::{CustomRoutes, RouterMapFn, SELECTED_ACCOUNT_COOKIE};
use crate::middleware::require_authentication;
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all private routes.
fn private_routes(
    additional_routes: Option<Router<ServiceState>>,
    state: ServiceState,
) -> Router<ServiceState> {
    let mut router = Router::new()
        .merge(authentication::routes())
        .merge(files::routes(state))
        .merge(archives::routes())
        .merge(accounts::routes());

    if let Some(additional) = additional_routes {
        router = router.merge(additional);
    }

    router
}

/// Returns a [`Router`] with all public routes.
fn public_routes(additional_routes: Option<Router<ServiceState>>) -> Router<ServiceState> {
    let mut router = Router::new()
        .merge(authentication::public_routes())
        .merge(monitors::routes());

    if let Some(additional) = additional_routes {
        router = router.merge(additional);
    }

    router
}

/// Returns a [`Router`] with all routes.
///
/// Everything except sign-in, token exchange and the health check requires
/// a session; capability checks run inside the session check.
pub fn routes(routes: CustomRoutes, state: ServiceState) -> Router<ServiceState> {
    let require_authentication = from_fn_with_state(state.clone(), require_authentication);

    let mut private_router = private_routes(routes.private_routes, state);
    if let Some(map) = routes.private_before_middleware {
        private_router = map(private_router);
    }
    let private_router = private_router.route_layer(require_authentication);

    let public_router = public_routes(routes.public_routes);

    Router::new()
        .merge(private_router)
        .merge(public_router)
        .fallback(handler)
}

#[cfg(test)]
pub(crate) mod test {
    use std::path::Path;

    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use bytes::Bytes;
    use fileblobs_storage::{BackendKind, ClientCache, StorageClient};
    use serde_json::json;
    use tempfile::TempDir;

    use crate::extract::SESSION_COOKIE;
    use crate::handler::{CustomRoutes, routes};
    use crate::service::{ServiceConfig, ServiceState};

    /// A server over the memory backend with its repository in a temp dir.
    pub struct TestContext {
        pub server: TestServer,
        pub state: ServiceState,
        _data_dir: TempDir,
    }

    impl TestContext {
        /// Returns the client bound to the selected account.
        pub async fn client(&self) -> anyhow::Result<StorageClient> {
            let client_cache: ClientCache = axum::extract::FromRef::from_ref(&self.state);
            Ok(client_cache.get_client().await?)
        }

        /// Writes objects into the selected account.
        pub async fn seed(&self, objects: &[(&str, &'static [u8])]) -> anyhow::Result<()> {
            let client = self.client().await?;
            for (key, data) in objects {
                client.upload(key, Bytes::from_static(data)).await?;
            }
            Ok(())
        }

        /// Signs in as the seeded administrator.
        pub async fn login_admin(&self) -> Cookie<'static> {
            login(&self.server, "admin", "admin").await
        }
    }

    /// Shared secret verifying identity tokens in tests.
    pub const IDENTITY_SECRET: &str = "identity-secret";

    /// Returns a configuration over the memory backend.
    pub fn test_config(data_dir: &Path) -> ServiceConfig {
        ServiceConfig {
            azure_account_name: "devacct".to_owned(),
            azure_account_key: "a2V5".to_owned(),
            azure_container: "files".to_owned(),
            storage_backend: BackendKind::Memory,
            data_dir: data_dir.to_path_buf(),
            oidc_hmac_secret: Some(IDENTITY_SECRET.to_owned()),
            ..ServiceConfig::default()
        }
    }

    /// Returns a new [`TestServer`] with the default router and a fresh state.
    pub async fn create_test_context() -> anyhow::Result<TestContext> {
        create_test_context_with(|_| {}).await
    }

    /// Same as [`create_test_context`] with an adjusted configuration.
    pub async fn create_test_context_with(
        configure: impl FnOnce(&mut ServiceConfig),
    ) -> anyhow::Result<TestContext> {
        let data_dir = tempfile::tempdir()?;
        let mut config = test_config(data_dir.path());
        configure(&mut config);
        let state = ServiceState::from_config(&config).await?;
        let app = routes(CustomRoutes::new(), state.clone()).with_state(state.clone());
        let server = TestServer::new(app)?;

        Ok(TestContext {
            server,
            state,
            _data_dir: data_dir,
        })
    }

    /// Signs in and returns the session cookie.
    pub async fn login(server: &TestServer, username: &str, password: &str) -> Cookie<'static> {
        let response = server
            .post("/login")
            .json(&json!({ "username": username, "password": password }))
            .await;
        response.assert_status_ok();
        response.cookie(SESSION_COOKIE)
    }

    /// Builds an identity token signed with the test secret.
    ///
    /// An `exp` one hour ahead is added unless `claims` carries one.
    pub fn identity_token(claims: &serde_json::Value) -> String {
        identity_token_signed_with(claims, IDENTITY_SECRET)
    }

    /// Builds an HS256 identity token signed with `secret`.
    pub fn identity_token_signed_with(claims: &serde_json::Value, secret: &str) -> String {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let mut claims = claims.clone();
        if claims.get("exp").is_none() {
            claims["exp"] = json!(jiff::Timestamp::now().as_second() + 3600);
        }

        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&Header::default(), &claims, &key).expect("test claims encode")
    }

    /// Exchanges an identity token for a session cookie.
    pub async fn login_with_token(server: &TestServer, claims: serde_json::Value) -> Cookie<'static> {
        let response = server
            .post("/auth/store-token")
            .json(&json!({ "token": identity_token(&claims) }))
            .await;
        response.assert_status_ok();
        response.cookie(SESSION_COOKIE)
    }

    #[tokio::test]
    async fn handlers() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        assert!(context.server.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn private_routes_require_session() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        for path in ["/files", "/me", "/storage-accounts", "/download-folder?path=a"] {
            let response = context.server.get(path).await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = response.json();
            assert_eq!(body["name"], "missing_session");
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let response = context.server.get("/nowhere").await;
        response.assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn custom_routes_are_merged() -> anyhow::Result<()> {
        use axum::Router;
        use axum::routing::get;

        let data_dir = tempfile::tempdir()?;
        let state = ServiceState::from_config(&test_config(data_dir.path())).await?;
        let custom = CustomRoutes::new()
            .with_public_routes(Router::new().route("/open", get(|| async { "open" })))
            .with_private_routes(Router::new().route("/closed", get(|| async { "closed" })));
        let app = routes(custom, state.clone()).with_state(state);
        let server = TestServer::new(app)?;

        server.get("/open").await.assert_text("open");
        server
            .get("/closed")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let cookie = login(&server, "admin", "admin").await;
        server
            .get("/closed")
            .add_cookie(cookie)
            .await
            .assert_text("closed");
        Ok(())
    }
}
