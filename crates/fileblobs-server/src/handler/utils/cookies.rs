//! Cookies set by the browser-facing handlers.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::extract::SESSION_COOKIE;
use crate::service::DEFAULT_ACCOUNT_NAME;

/// Name of the cookie remembering the storage account a browser selected.
pub const SELECTED_ACCOUNT_COOKIE: &str = "selected_account";

fn cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Adds the session cookie.
pub fn with_session(jar: CookieJar, session_id: uuid::Uuid) -> CookieJar {
    jar.add(cookie(SESSION_COOKIE, session_id.to_string()))
}

/// Adds the selected-account cookie.
pub fn with_selected_account(jar: CookieJar, name: &str) -> CookieJar {
    jar.add(cookie(SELECTED_ACCOUNT_COOKIE, name.to_owned()))
}

/// Returns the account this browser selected, or the default account.
pub fn selected_account(jar: &CookieJar) -> String {
    jar.get(SELECTED_ACCOUNT_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_owned())
}

/// Expires every cookie this server sets.
pub fn cleared(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(SELECTED_ACCOUNT_COOKIE).path("/"))
}
