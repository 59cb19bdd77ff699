//! Storage account listing, selection and administration.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum_extra::extract::CookieJar;
use fileblobs_storage::ClientCache;

use super::request::StorageAccountForm;
use super::response::{StorageAccount, StorageAccounts};
use super::utils::{selected_account, with_selected_account};
use crate::extract::{AuthState, Capability, Json, Path, ValidateJson};
use crate::handler::{ErrorKind, Result};
use crate::middleware::require_capability;
use crate::service::{AccountRepository, ServiceConfig, ServiceState, StorageAccountRecord};

/// Tracing target for storage account operations.
const TRACING_TARGET: &str = "fileblobs_server::handler::accounts";

/// Picks the key for a submitted form.
///
/// `use_default_key` takes the default account's key, a blank key keeps
/// `existing`, anything else is used as given.
async fn resolve_account_key(
    repository: &AccountRepository,
    service_config: &ServiceConfig,
    form: &StorageAccountForm,
    existing: Option<&StorageAccountRecord>,
) -> Result<String> {
    if form.use_default_key {
        let default_key = match repository.default_account().await {
            Some(record) => record.account_key,
            None => service_config.azure_account_key.clone(),
        };

        if default_key.is_empty() {
            return Err(ErrorKind::BadRequest
                .with_message("No default key is configured")
                .with_resource("accountKey"));
        }
        return Ok(default_key);
    }

    let account_key = form.account_key.trim();
    match (account_key.is_empty(), existing) {
        (false, _) => Ok(account_key.to_owned()),
        (true, Some(record)) => Ok(record.account_key.clone()),
        (true, None) => Err(ErrorKind::BadRequest
            .with_message("Account key is required")
            .with_resource("accountKey")),
    }
}

fn record_from_form(form: StorageAccountForm, account_key: String) -> StorageAccountRecord {
    StorageAccountRecord {
        name: form.name,
        description: form.description.trim().to_owned(),
        account_name: form.account_name.trim().to_owned(),
        account_key,
        container_name: form.container_name.trim().to_owned(),
        endpoint: form.endpoint.filter(|endpoint| !endpoint.trim().is_empty()),
    }
}

/// Lists every account and the one this browser selected.
#[tracing::instrument(skip_all)]
async fn list_accounts(
    State(repository): State<AccountRepository>,
    jar: CookieJar,
) -> Result<Json<StorageAccounts>> {
    let accounts: Vec<StorageAccount> = repository
        .list_accounts()
        .await
        .into_iter()
        .map(StorageAccount::from)
        .collect();

    Ok(Json(StorageAccounts {
        accounts,
        selected: selected_account(&jar),
    }))
}

/// Adds an account for the lifetime of the process.
#[tracing::instrument(skip_all, fields(subject = %auth_state.subject))]
async fn add_account(
    State(repository): State<AccountRepository>,
    State(service_config): State<ServiceConfig>,
    auth_state: AuthState,
    ValidateJson(form): ValidateJson<StorageAccountForm>,
) -> Result<(StatusCode, Json<StorageAccount>)> {
    let account_key = resolve_account_key(&repository, &service_config, &form, None).await?;
    let record = record_from_form(form, account_key);

    let record = repository.add_account(record).await?;

    tracing::info!(
        target: TRACING_TARGET,
        name = %record.name,
        "Storage account added"
    );

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Updates an account; re-binds the client when it is the selected one.
#[tracing::instrument(skip_all, fields(subject = %auth_state.subject, account = %name))]
async fn update_account(
    State(repository): State<AccountRepository>,
    State(client_cache): State<ClientCache>,
    State(service_config): State<ServiceConfig>,
    auth_state: AuthState,
    jar: CookieJar,
    Path(name): Path<String>,
    ValidateJson(form): ValidateJson<StorageAccountForm>,
) -> Result<(CookieJar, Json<StorageAccount>)> {
    let existing = repository.find_account(&name).await.ok_or_else(|| {
        ErrorKind::NotFound
            .with_resource("storage account")
            .with_context(format!("Storage account '{name}' does not exist"))
    })?;

    let account_key =
        resolve_account_key(&repository, &service_config, &form, Some(&existing)).await?;
    let record = record_from_form(form, account_key);

    let record = repository.update_account(&name, record).await?;

    let jar = if selected_account(&jar) == name {
        client_cache.set_identity(record.to_identity()).await;
        with_selected_account(jar, &record.name)
    } else {
        jar
    };

    tracing::info!(
        target: TRACING_TARGET,
        name = %record.name,
        "Storage account updated"
    );

    Ok((jar, Json(record.into())))
}

/// Makes an account the active one.
#[tracing::instrument(skip_all, fields(subject = %auth_state.subject, account = %name))]
async fn select_account(
    State(repository): State<AccountRepository>,
    State(client_cache): State<ClientCache>,
    auth_state: AuthState,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<(CookieJar, Json<StorageAccount>)> {
    let record = repository.find_account(&name).await.ok_or_else(|| {
        ErrorKind::NotFound
            .with_resource("storage account")
            .with_context(format!("Storage account '{name}' does not exist"))
    })?;

    let identity = record.to_identity();
    identity.validate()?;
    client_cache.set_identity(identity).await;

    tracing::info!(
        target: TRACING_TARGET,
        account = %record.account_name,
        container = %record.container_name,
        "Storage account selected"
    );

    let jar = with_selected_account(jar, &record.name);
    Ok((jar, Json(record.into())))
}

/// Returns a [`Router`] with the storage account routes.
pub fn routes() -> Router<ServiceState> {
    let switch = Router::new()
        .route("/storage-accounts", get(list_accounts))
        .route("/storage-accounts/{name}/select", post(select_account))
        .route_layer(from_fn_with_state(
            Capability::SwitchAccount,
            require_capability,
        ));

    let manage = Router::new()
        .route("/storage-accounts", post(add_account))
        .route("/storage-accounts/{name}", put(update_account))
        .route_layer(from_fn_with_state(
            Capability::ManageAccounts,
            require_capability,
        ));

    switch.merge(manage)
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRef;
    use serde_json::{Value, json};

    use super::*;
    use crate::handler::SELECTED_ACCOUNT_COOKIE;
    use crate::handler::test::{create_test_context, login_with_token};
    use crate::service::DEFAULT_ACCOUNT_NAME;

    fn account_form(name: &str, container: &str) -> Value {
        json!({
            "name": name,
            "description": "Archive container",
            "accountName": "devacct",
            "accountKey": "",
            "containerName": container,
            "useDefaultKey": true,
        })
    }

    #[tokio::test]
    async fn lists_default_account_without_keys() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        let response = context
            .server
            .get("/storage-accounts")
            .add_cookie(cookie)
            .await;
        response.assert_status_ok();
        assert!(!response.text().contains("a2V5"));

        let body: Value = response.json();
        assert_eq!(body["selected"], DEFAULT_ACCOUNT_NAME);
        assert_eq!(body["accounts"][0]["name"], DEFAULT_ACCOUNT_NAME);
        assert_eq!(body["accounts"][0]["isDefault"], true);
        Ok(())
    }

    #[tokio::test]
    async fn add_select_and_browse_another_container() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        context.seed(&[("default.txt", b"d")]).await?;
        let cookie = context.login_admin().await;

        let response = context
            .server
            .post("/storage-accounts")
            .add_cookie(cookie.clone())
            .json(&account_form("Archive", "archive"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["name"], "Archive");
        assert_eq!(body["isDefault"], false);

        let response = context
            .server
            .post("/storage-accounts/Archive/select")
            .add_cookie(cookie.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(response.cookie(SELECTED_ACCOUNT_COOKIE).value(), "Archive");

        let listing: Value = context.server.get("/files").add_cookie(cookie).await.json();
        assert_eq!(listing["files"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_names_conflict() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        context
            .server
            .post("/storage-accounts")
            .add_cookie(cookie.clone())
            .json(&account_form(DEFAULT_ACCOUNT_NAME, "other"))
            .await
            .assert_status(StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn default_account_is_immutable() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        let response = context
            .server
            .put("/storage-accounts/Default%20Account")
            .add_cookie(cookie)
            .json(&account_form("", "other"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_key_and_rebinds_selected_account() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        context
            .server
            .post("/storage-accounts")
            .add_cookie(cookie.clone())
            .json(&account_form("Archive", "archive"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = context
            .server
            .post("/storage-accounts/Archive/select")
            .add_cookie(cookie.clone())
            .await;
        let selected = response.cookie(SELECTED_ACCOUNT_COOKIE);

        let update = json!({
            "name": "Renamed",
            "accountName": "devacct",
            "accountKey": "",
            "containerName": "renamed",
        });
        let response = context
            .server
            .put("/storage-accounts/Archive")
            .add_cookie(cookie.clone())
            .add_cookie(selected)
            .json(&update)
            .await;
        response.assert_status_ok();
        assert_eq!(response.cookie(SELECTED_ACCOUNT_COOKIE).value(), "Renamed");

        let client_cache = ClientCache::from_ref(&context.state);
        let client = client_cache.get_client().await?;
        assert_eq!(client.identity().container_name, "renamed");

        context
            .server
            .put("/storage-accounts/Missing")
            .add_cookie(cookie)
            .json(&update)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn consultants_cannot_manage_accounts() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = login_with_token(
            &context.server,
            json!({ "sub": "u-1", "roles": "IdentityConsultant" }),
        )
        .await;

        let response = context
            .server
            .post("/storage-accounts")
            .add_cookie(cookie.clone())
            .json(&account_form("Archive", "archive"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["name"], "forbidden");

        context
            .server
            .get("/storage-accounts")
            .add_cookie(cookie)
            .await
            .assert_status_ok();
        Ok(())
    }

    #[tokio::test]
    async fn selecting_unknown_account_is_not_found() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        context
            .server
            .post("/storage-accounts/Nope/select")
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }
}
