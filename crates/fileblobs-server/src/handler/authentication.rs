//! Local sign-in, identity-token exchange, sign-out and the current principal.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum_extra::extract::CookieJar;

use super::request::{Login, StoreToken};
use super::response::Me;
use super::utils::{cleared, with_session};
use crate::extract::{AuthState, FormOrJson, IdentityClaims, Json, Principal};
use crate::handler::{ErrorKind, Result};
use crate::service::{AccountRepository, IdentityKeys, ServiceState, SessionStore};

/// Tracing target for authentication operations.
const TRACING_TARGET: &str = "fileblobs_server::handler::authentication";

/// Checks credentials against the repository and starts a session.
#[tracing::instrument(skip_all, fields(username = %request.username))]
async fn login(
    State(repository): State<AccountRepository>,
    State(sessions): State<SessionStore>,
    jar: CookieJar,
    FormOrJson(request): FormOrJson<Login>,
) -> Result<(CookieJar, Json<Me>)> {
    let Some(user) = repository
        .authenticate(&request.username, &request.password)
        .await
    else {
        tracing::warn!(target: TRACING_TARGET, "Login failed: invalid credentials");
        return Err(ErrorKind::Unauthorized
            .with_message("Invalid username or password"));
    };

    let principal = Principal::local(user.username, user.is_admin);
    let session_id = sessions.create(principal.clone()).await;

    tracing::info!(
        target: TRACING_TARGET,
        is_admin = principal.is_admin,
        "Login successful"
    );

    Ok((with_session(jar, session_id), Json(principal.into())))
}

/// Starts a session from an identity-provider token.
#[tracing::instrument(skip_all)]
async fn store_token(
    State(identity_keys): State<IdentityKeys>,
    State(sessions): State<SessionStore>,
    jar: CookieJar,
    FormOrJson(request): FormOrJson<StoreToken>,
) -> Result<(CookieJar, Json<Me>)> {
    let principal = IdentityClaims::decode(&request.token, &identity_keys)?.into_principal()?;
    let session_id = sessions.create(principal.clone()).await;

    tracing::info!(
        target: TRACING_TARGET,
        subject = %principal.subject,
        is_admin = principal.is_admin,
        "Identity token accepted"
    );

    Ok((with_session(jar, session_id), Json(principal.into())))
}

/// Ends the session and clears the cookies.
#[tracing::instrument(skip_all, fields(subject = %auth_state.subject))]
async fn logout(
    State(sessions): State<SessionStore>,
    auth_state: AuthState,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    sessions.remove(auth_state.session_id()).await;
    tracing::info!(target: TRACING_TARGET, "Logout successful");
    (cleared(jar), StatusCode::NO_CONTENT)
}

/// Returns the signed-in principal and its capabilities.
#[tracing::instrument(skip_all)]
async fn me(auth_state: AuthState) -> Json<Me> {
    Json(auth_state.principal().clone().into())
}

/// Returns a [`Router`] with the routes that need no session.
pub fn public_routes() -> Router<ServiceState> {
    Router::new()
        .route("/login", post(login))
        .route("/auth/store-token", post(store_token))
}

/// Returns a [`Router`] with the session routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bytes::Bytes;
    use serde_json::{Value, json};

    use crate::extract::SESSION_COOKIE;
    use crate::handler::test::{
        create_test_context, identity_token, identity_token_signed_with, login_with_token,
    };

    #[tokio::test]
    async fn login_accepts_json_and_form() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let response = context
            .server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "admin" }))
            .await;
        response.assert_status_ok();
        let me: Value = response.json();
        assert_eq!(me["subject"], "admin");
        assert_eq!(me["isAdmin"], true);
        assert_eq!(me["source"], "local");

        let cookie = response.cookie(SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let response = context
            .server
            .post("/login")
            .bytes(Bytes::from_static(b"username=admin&password=admin"))
            .content_type("application/x-www-form-urlencoded")
            .await;
        response.assert_status_ok();
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let response = context
            .server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "wrong" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["name"], "unauthorized");
        Ok(())
    }

    #[tokio::test]
    async fn me_reports_capabilities() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let cookie = context.login_admin().await;
        let me: Value = context.server.get("/me").add_cookie(cookie).await.json();
        assert_eq!(
            me["capabilities"],
            json!(["browse", "download", "upload", "switchAccount", "manageAccounts"])
        );

        let cookie = login_with_token(
            &context.server,
            json!({ "sub": "u-1", "name": "Ann", "roles": ["Consultant"] }),
        )
        .await;
        let me: Value = context.server.get("/me").add_cookie(cookie).await.json();
        assert_eq!(me["displayName"], "Ann");
        assert_eq!(me["source"], "oidc");
        assert_eq!(me["isAdmin"], false);
        assert_eq!(
            me["capabilities"],
            json!(["browse", "download", "upload", "switchAccount"])
        );
        Ok(())
    }

    #[tokio::test]
    async fn tokens_without_roles_are_denied() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let token = identity_token(&json!({ "sub": "u-2", "roles": ["Guest"] }));
        let response = context
            .server
            .post("/auth/store-token")
            .json(&json!({ "token": token }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["name"], "access_denied");

        context
            .server
            .post("/auth/store-token")
            .json(&json!({ "token": "garbage" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn forged_tokens_are_unauthorized() -> anyhow::Result<()> {
        let context = create_test_context().await?;

        let token = identity_token_signed_with(
            &json!({ "sub": "mallory", "role": "Administrator" }),
            "not-the-configured-secret",
        );
        let response = context
            .server
            .post("/auth/store-token")
            .json(&json!({ "token": token }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.maybe_cookie(SESSION_COOKIE).is_none());

        let token = identity_token(&json!({ "sub": "ann", "role": "Consultant", "exp": 1_000 }));
        context
            .server
            .post("/auth/store-token")
            .json(&json!({ "token": token }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn token_sign_in_is_refused_without_a_key() -> anyhow::Result<()> {
        let context = crate::handler::test::create_test_context_with(|config| {
            config.oidc_hmac_secret = None;
        })
        .await?;

        let token = identity_token(&json!({ "sub": "ann", "role": "Consultant" }));
        context
            .server
            .post("/auth/store-token")
            .json(&json!({ "token": token }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_ends_the_session() -> anyhow::Result<()> {
        let context = create_test_context().await?;
        let cookie = context.login_admin().await;

        context
            .server
            .post("/logout")
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        context
            .server
            .get("/me")
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
