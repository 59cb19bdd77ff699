use serde::Deserialize;
use validator::Validate;

/// Body of the add and update storage account requests.
#[derive(Clone, Deserialize, Validate, derive_more::Debug)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountForm {
    /// Display name; blank generates one on add and keeps the old one on update.
    #[serde(default)]
    #[validate(length(max = 128))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub description: String,
    #[validate(length(min = 1, max = 64))]
    pub account_name: String,
    /// Shared key; may be blank when `use_default_key` is set, or on update
    /// to keep the stored key.
    #[serde(default)]
    #[debug(skip)]
    pub account_key: String,
    #[validate(length(min = 1, max = 63))]
    pub container_name: String,
    #[serde(default)]
    #[validate(url)]
    pub endpoint: Option<String>,
    /// Reuse the key of the default account.
    #[serde(default)]
    pub use_default_key: bool,
}
