//! Storage identity: the credentials a client is bound to.

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Default blob endpoint suffix for public Azure.
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Well-known account of the local storage emulator.
const EMULATOR_ACCOUNT_NAME: &str = "devstoreaccount1";

/// Well-known key of the local storage emulator.
const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Credentials identifying one storage account container.
///
/// Exactly one identity is active at a time; it is owned by the
/// [`ClientCache`](crate::ClientCache) and swapped explicitly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Debug)]
#[serde(rename_all = "camelCase")]
pub struct StorageIdentity {
    /// Storage account name.
    pub account_name: String,
    /// Shared account key (base64).
    #[debug(skip)]
    pub account_key: String,
    /// Container holding the blobs.
    pub container_name: String,
    /// Blob service endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl StorageIdentity {
    /// Creates a new identity using the public endpoint of the account.
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            container_name: container_name.into(),
            endpoint: None,
        }
    }

    /// Sets the blob service endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Returns the names of the required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("accountName", &self.account_name),
            ("accountKey", &self.account_key),
            ("containerName", &self.container_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Fails with a configuration error naming every blank required field.
    pub fn validate(&self) -> StorageResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StorageError::configuration(missing))
        }
    }

    /// Returns the blob service endpoint.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => format!(
                "https://{}.blob.{}",
                self.account_name, DEFAULT_ENDPOINT_SUFFIX
            ),
        }
    }

    /// Parses an Azure storage connection string and binds it to `container_name`.
    ///
    /// Recognizes `AccountName`, `AccountKey`, `BlobEndpoint`,
    /// `DefaultEndpointsProtocol`, `EndpointSuffix` and
    /// `UseDevelopmentStorage=true`.
    pub fn from_connection_string(
        connection_string: &str,
        container_name: impl Into<String>,
    ) -> StorageResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut blob_endpoint = None;
        let mut protocol = "https";
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX;
        let mut development = false;

        for segment in connection_string.split(';').map(str::trim) {
            if segment.is_empty() {
                continue;
            }

            let Some((name, value)) = segment.split_once('=') else {
                return Err(StorageError::invalid_input(format!(
                    "malformed connection string segment '{}'",
                    name_only(segment)
                )));
            };

            match name.trim() {
                "AccountName" => account_name = Some(value.trim()),
                "AccountKey" => account_key = Some(value.trim()),
                "BlobEndpoint" => blob_endpoint = Some(value.trim()),
                "DefaultEndpointsProtocol" => protocol = value.trim(),
                "EndpointSuffix" => suffix = value.trim(),
                "UseDevelopmentStorage" => development = value.trim().eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            let endpoint = blob_endpoint
                .map(str::to_owned)
                .unwrap_or_else(|| format!("http://127.0.0.1:10000/{EMULATOR_ACCOUNT_NAME}"));
            return Ok(
                Self::new(EMULATOR_ACCOUNT_NAME, EMULATOR_ACCOUNT_KEY, container_name)
                    .with_endpoint(endpoint),
            );
        }

        let account_name = account_name
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StorageError::invalid_input("connection string has no AccountName"))?;
        let account_key = account_key
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StorageError::invalid_input("connection string has no AccountKey"))?;

        let endpoint = blob_endpoint
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{protocol}://{account_name}.blob.{suffix}"));

        Ok(Self::new(account_name, account_key, container_name).with_endpoint(endpoint))
    }
}

/// Keeps secrets out of error messages for segments without `=`.
fn name_only(segment: &str) -> &str {
    segment.get(..segment.len().min(24)).unwrap_or_default()
}
