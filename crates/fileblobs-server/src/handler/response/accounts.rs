use serde::Serialize;

use crate::service::StorageAccountRecord;

/// A storage account record without its key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    pub name: String,
    pub description: String,
    pub account_name: String,
    pub container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub is_default: bool,
}

impl From<StorageAccountRecord> for StorageAccount {
    fn from(record: StorageAccountRecord) -> Self {
        Self {
            is_default: record.is_default(),
            name: record.name,
            description: record.description,
            account_name: record.account_name,
            container_name: record.container_name,
            endpoint: record.endpoint,
        }
    }
}

/// Every selectable account and the one this browser selected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccounts {
    pub accounts: Vec<StorageAccount>,
    pub selected: String,
}
