//! Projection of a flat blob namespace into one directory level.

use std::collections::HashSet;
use std::pin::pin;

use futures::{Stream, TryStreamExt};
use serde::Serialize;

use crate::error::{StorageError, StorageResult};
use crate::key::{self, DELIMITER};

/// Immediate children of a prefix.
///
/// Folders are full paths from the container root with the trailing
/// delimiter trimmed; files are leaf names with the prefix stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingResult {
    /// Child prefixes one level below the queried prefix.
    pub folders: Vec<String>,
    /// Objects directly under the queried prefix.
    pub files: Vec<String>,
}

impl ListingResult {
    /// Returns `true` if the prefix has no children.
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }

    /// Keeps only folders and files containing `query`, ignoring case.
    pub fn filter(self, query: &str) -> Self {
        let query = query.to_lowercase();
        if query.is_empty() {
            return self;
        }

        let matches = |item: &String| item.to_lowercase().contains(&query);
        Self {
            folders: self.folders.into_iter().filter(matches).collect(),
            files: self.files.into_iter().filter(matches).collect(),
        }
    }

    /// Drains a hierarchical listing under `prefix` into a [`ListingResult`].
    ///
    /// Entries are raw keys as returned by the backing store: directories end
    /// with the delimiter. A failing item aborts the whole projection.
    pub(crate) async fn project<S>(prefix: &str, entries: S) -> StorageResult<Self>
    where
        S: Stream<Item = Result<String, opendal::Error>>,
    {
        let mut entries = pin!(entries);
        let mut seen = HashSet::new();
        let mut listing = Self::default();

        while let Some(path) = entries
            .try_next()
            .await
            .map_err(|err| StorageError::listing(prefix, err))?
        {
            if path == prefix || path == "/" {
                continue;
            }

            let Some(rest) = path.strip_prefix(prefix) else {
                continue;
            };

            match rest.find(DELIMITER) {
                Some(end) => {
                    let folder = format!("{prefix}{}", &rest[..end]);
                    if seen.insert(folder.clone()) {
                        listing.folders.push(folder);
                    }
                }
                None => listing.files.push(rest.to_owned()),
            }
        }

        Ok(listing)
    }
}

/// Drains a flat listing under `prefix`, keeping every non-marker key.
pub(crate) async fn collect_keys<S>(prefix: &str, entries: S) -> StorageResult<Vec<String>>
where
    S: Stream<Item = Result<String, opendal::Error>>,
{
    let mut entries = pin!(entries);
    let mut keys = Vec::new();

    while let Some(path) = entries
        .try_next()
        .await
        .map_err(|err| StorageError::listing(prefix, err))?
    {
        if key::is_directory_marker(&path) || !path.starts_with(prefix) {
            continue;
        }
        keys.push(path);
    }

    Ok(keys)
}
