use fileblobs_storage::ListingResult;
use serde::Serialize;

/// One level of the namespace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Normalized prefix that was listed.
    pub prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub query: String,
    /// Child folders as full paths from the container root, without the
    /// trailing `/`.
    pub folders: Vec<String>,
    /// Leaf names of the files directly under the prefix.
    pub files: Vec<String>,
}

impl Listing {
    pub fn new(prefix: String, query: String, listing: ListingResult) -> Self {
        Self {
            prefix,
            query,
            folders: listing.folders,
            files: listing.files,
        }
    }
}

/// Keys written by an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploaded {
    pub prefix: String,
    pub keys: Vec<String>,
}
