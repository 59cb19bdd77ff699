//! Keys and validation rules for identity tokens handed over after an
//! external sign-in.

use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::errors::{ErrorKind as JwtErrorKind, Result as JwtResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;

use crate::service::ServiceConfig;
use crate::{Error, Result};

/// Tracing target for identity key loading.
const TRACING_TARGET: &str = "fileblobs_server::service::identity_keys";

/// Claims every identity token must carry.
const REQUIRED_CLAIMS: [&str; 1] = ["exp"];

/// How identity tokens are checked.
#[derive(Clone)]
enum Verification {
    /// No key is configured; token sign-in is refused.
    Disabled,
    /// Tokens are checked against `key` under `validation`.
    Enabled {
        key: DecodingKey,
        validation: Validation,
    },
    /// Claims are validated but signatures are not.
    Unverified { validation: Validation },
}

/// Verification material for identity tokens.
///
/// An RSA public key takes precedence over a shared secret. Without either,
/// tokens are refused unless signature checks are explicitly switched off.
#[derive(Clone)]
pub struct IdentityKeys {
    inner: Arc<Verification>,
}

impl IdentityKeys {
    /// Loads the keys described by `config`.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let verification = if let Some(path) = &config.oidc_public_key_file {
            let key = Self::load_rsa_key(path).await?;
            let validation =
                Self::validation(config, &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512]);
            Verification::Enabled { key, validation }
        } else if let Some(secret) = &config.oidc_hmac_secret {
            let key = DecodingKey::from_secret(secret.as_bytes());
            let validation =
                Self::validation(config, &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512]);
            Verification::Enabled { key, validation }
        } else if config.oidc_insecure_skip_signature {
            tracing::warn!(
                target: TRACING_TARGET,
                "Identity token signatures are not verified",
            );
            let mut validation = Self::validation(
                config,
                &[
                    Algorithm::HS256,
                    Algorithm::HS384,
                    Algorithm::HS512,
                    Algorithm::RS256,
                    Algorithm::RS384,
                    Algorithm::RS512,
                    Algorithm::PS256,
                    Algorithm::PS384,
                    Algorithm::PS512,
                ],
            );
            validation.insecure_disable_signature_validation();
            Verification::Unverified { validation }
        } else {
            tracing::info!(
                target: TRACING_TARGET,
                "No identity token key configured, token sign-in is disabled",
            );
            Verification::Disabled
        };

        Ok(Self {
            inner: Arc::new(verification),
        })
    }

    /// Returns whether identity tokens are accepted at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.inner.as_ref(), Verification::Disabled)
    }

    /// Decodes and validates the claims of `token`.
    pub fn decode<T>(&self, token: &str) -> JwtResult<T>
    where
        T: DeserializeOwned + Clone,
    {
        match self.inner.as_ref() {
            Verification::Disabled => Err(JwtErrorKind::InvalidKeyFormat.into()),
            Verification::Enabled { key, validation } => {
                Ok(decode::<T>(token, key, validation)?.claims)
            }
            Verification::Unverified { validation } => {
                let header = decode_header(token)?;
                let key = Self::unverified_key(header.alg)?;
                Ok(decode::<T>(token, &key, validation)?.claims)
            }
        }
    }

    /// Returns a placeholder key of the family `algorithm` belongs to.
    ///
    /// Signatures are not checked; the key only has to match the family.
    fn unverified_key(algorithm: Algorithm) -> JwtResult<DecodingKey> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                Ok(DecodingKey::from_secret(&[]))
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_components("AQAB", "AQAB"),
            _ => Err(JwtErrorKind::InvalidAlgorithm.into()),
        }
    }

    fn validation(config: &ServiceConfig, algorithms: &[Algorithm]) -> Validation {
        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms.to_vec();
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);
        validation.validate_exp = true;

        match &config.oidc_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        if let Some(issuer) = &config.oidc_issuer {
            validation.set_issuer(&[issuer]);
        }

        validation
    }

    async fn load_rsa_key(path: &Path) -> Result<DecodingKey> {
        tracing::debug!(
            target: TRACING_TARGET,
            path = %path.display(),
            "Loading identity token public key",
        );

        let pem_data = tokio::fs::read(path).await.map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                path = %path.display(),
                error = %err,
                "Failed to read identity token public key",
            );
            Error::file_system("failed to read identity token public key").with_source(err)
        })?;

        DecodingKey::from_rsa_pem(&pem_data).map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                path = %path.display(),
                error = %err,
                "Identity token public key is not an RSA PEM",
            );
            Error::config("invalid identity token public key").with_source(err)
        })
    }
}
