use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
#[cfg(feature = "config")]
use clap::Args;
use fileblobs_storage::{BackendKind, OpendalFactory, StorageIdentity};
use serde::{Deserialize, Serialize};

/// Default values for configuration options.
mod defaults {
    use std::path::PathBuf;

    /// Default directory holding `auth.json`.
    pub fn data_dir() -> PathBuf {
        "./data".into()
    }

    /// Default administrator name seeded into a fresh repository.
    pub const ADMIN_USERNAME: &str = "admin";

    /// Default administrator password seeded into a fresh repository.
    pub const ADMIN_PASSWORD: &str = "admin";

    /// Default per-operation storage timeout in seconds.
    pub const STORAGE_TIMEOUT_SECS: u64 = 60;

    /// Default session lifetime in seconds.
    pub const SESSION_TTL_SECS: u64 = 3600;

    /// Default upload limit: 32 MiB.
    pub const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Clone, Serialize, Deserialize, derive_more::Debug)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Storage account of the default record.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AZURE_STORAGE_ACCOUNT_NAME", default_value = "")
    )]
    pub azure_account_name: String,

    /// Shared key of the default record.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AZURE_STORAGE_ACCOUNT_KEY", default_value = "", hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    #[debug(skip)]
    pub azure_account_key: String,

    /// Container of the default record.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AZURE_STORAGE_CONTAINER", default_value = "")
    )]
    pub azure_container: String,

    /// Blob service endpoint override (emulators, sovereign clouds).
    #[cfg_attr(feature = "config", arg(long, env = "AZURE_STORAGE_ENDPOINT"))]
    pub azure_endpoint: Option<String>,

    /// Storage backend used to build clients.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = BackendKind::AzureBlob)
    )]
    pub storage_backend: BackendKind,

    /// Per-operation storage timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STORAGE_TIMEOUT", default_value_t = defaults::STORAGE_TIMEOUT_SECS)
    )]
    pub storage_timeout: u64,

    /// Directory holding the account repository.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "DATA_DIR", default_value = "./data")
    )]
    pub data_dir: PathBuf,

    /// Administrator seeded into a fresh repository.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "ADMIN_USERNAME", default_value = defaults::ADMIN_USERNAME)
    )]
    pub admin_username: String,

    /// Password of the seeded administrator.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "ADMIN_PASSWORD", default_value = defaults::ADMIN_PASSWORD, hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    #[debug(skip)]
    pub admin_password: String,

    /// Session lifetime in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "SESSION_TTL", default_value_t = defaults::SESSION_TTL_SECS)
    )]
    pub session_ttl: u64,

    /// Maximum accepted upload body in bytes.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = defaults::MAX_UPLOAD_SIZE)
    )]
    pub max_upload_size: usize,

    /// Shared secret verifying HS256 identity tokens.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OIDC_HMAC_SECRET", hide_env_values = true)
    )]
    #[serde(skip_serializing)]
    #[debug(skip)]
    pub oidc_hmac_secret: Option<String>,

    /// PEM file with the RSA public key verifying RS256 identity tokens.
    #[cfg_attr(feature = "config", arg(long, env = "OIDC_PUBLIC_KEY_FILE"))]
    pub oidc_public_key_file: Option<PathBuf>,

    /// Expected `aud` claim of identity tokens.
    #[cfg_attr(feature = "config", arg(long, env = "OIDC_AUDIENCE"))]
    pub oidc_audience: Option<String>,

    /// Expected `iss` claim of identity tokens.
    #[cfg_attr(feature = "config", arg(long, env = "OIDC_ISSUER"))]
    pub oidc_issuer: Option<String>,

    /// Accepts identity tokens without checking their signature.
    ///
    /// Only for deployments where a trusted proxy already verified the token.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OIDC_INSECURE_SKIP_SIGNATURE", default_value_t = false)
    )]
    pub oidc_insecure_skip_signature: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            azure_account_name: String::new(),
            azure_account_key: String::new(),
            azure_container: String::new(),
            azure_endpoint: None,
            storage_backend: BackendKind::default(),
            storage_timeout: defaults::STORAGE_TIMEOUT_SECS,
            data_dir: defaults::data_dir(),
            admin_username: defaults::ADMIN_USERNAME.to_owned(),
            admin_password: defaults::ADMIN_PASSWORD.to_owned(),
            session_ttl: defaults::SESSION_TTL_SECS,
            max_upload_size: defaults::MAX_UPLOAD_SIZE,
            oidc_hmac_secret: None,
            oidc_public_key_file: None,
            oidc_audience: None,
            oidc_issuer: None,
            oidc_insecure_skip_signature: false,
        }
    }
}

impl ServiceConfig {
    /// Validates all configuration values and returns errors for invalid settings.
    ///
    /// An incomplete Azure identity is not an error here: the server starts and
    /// answers storage requests with a configuration error until an account is
    /// selected.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.admin_username.trim().is_empty() {
            return Err(anyhow!("administrator username cannot be empty"));
        }

        if self.admin_password.is_empty() {
            return Err(anyhow!("administrator password cannot be empty"));
        }

        if self.storage_timeout == 0 {
            return Err(anyhow!("storage timeout must be greater than zero"));
        }

        if self.session_ttl == 0 {
            return Err(anyhow!("session TTL must be greater than zero"));
        }

        if self.max_upload_size == 0 {
            return Err(anyhow!("maximum upload size must be greater than zero"));
        }

        if self
            .oidc_hmac_secret
            .as_deref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            return Err(anyhow!("identity token secret cannot be empty"));
        }

        if let Some(endpoint) = &self.azure_endpoint
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(anyhow!("storage endpoint must start with 'http://' or 'https://'"));
        }

        Ok(())
    }

    /// Returns the identity described by the `AZURE_STORAGE_*` settings.
    pub fn default_identity(&self) -> StorageIdentity {
        let identity = StorageIdentity::new(
            &self.azure_account_name,
            &self.azure_account_key,
            &self.azure_container,
        );

        match &self.azure_endpoint {
            Some(endpoint) => identity.with_endpoint(endpoint),
            None => identity,
        }
    }

    /// Returns the factory used to build storage clients.
    pub fn client_factory(&self) -> OpendalFactory {
        OpendalFactory::new(self.storage_backend)
            .with_timeout(Duration::from_secs(self.storage_timeout))
    }

    /// Returns the location of the account repository.
    pub fn repository_path(&self) -> PathBuf {
        self.data_dir.join("auth.json")
    }

    /// Returns the session lifetime.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_blank_identity_token_secret() {
        let config = ServiceConfig {
            oidc_hmac_secret: Some("  ".to_owned()),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_endpoint() {
        let config = ServiceConfig {
            azure_endpoint: Some("ftp://blobs".to_owned()),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_identity_uses_endpoint_override() {
        let config = ServiceConfig {
            azure_account_name: "acct".to_owned(),
            azure_account_key: "a2V5".to_owned(),
            azure_container: "docs".to_owned(),
            azure_endpoint: Some("http://127.0.0.1:10000/acct".to_owned()),
            ..ServiceConfig::default()
        };

        let identity = config.default_identity();
        assert!(identity.validate().is_ok());
        assert_eq!(identity.endpoint(), "http://127.0.0.1:10000/acct");
        assert!(config.repository_path().ends_with("auth.json"));
    }
}
