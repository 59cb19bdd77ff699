use serde::Deserialize;
use validator::Validate;

/// Query of `GET /files`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFiles {
    /// Folder to list; empty for the container root.
    #[serde(default)]
    pub prefix: String,
    /// Case-insensitive substring filter.
    #[serde(default)]
    pub q: String,
}

/// Query naming one blob or folder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Form of `POST /download-multiple`; `files` repeats once per key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadMultiple {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub prefix: String,
}

/// Body of `POST /download-zip`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DownloadZip {
    #[validate(length(min = 1))]
    pub connection_string: String,
    #[validate(length(min = 1, max = 63))]
    pub container_name: String,
    #[validate(length(min = 1))]
    pub folder_path: String,
}
