//! Blob key and prefix normalization.
//!
//! Keys are UTF-8 strings with `/` as the only hierarchy delimiter. A key
//! ending in `/` is a zero-byte directory marker and never a file.

use regex::Regex;

use crate::error::{StorageError, StorageResult};

/// The only recognized hierarchy delimiter.
pub const DELIMITER: char = '/';

/// Canonicalizes a blob key.
///
/// Converts `\` to `/`, drops leading delimiters and collapses doubled
/// delimiters. A trailing delimiter (directory marker) is kept.
pub fn normalize_key(key: &str) -> String {
    let mut normalized = String::with_capacity(key.len());

    for ch in key.chars() {
        let ch = if ch == '\\' { DELIMITER } else { ch };
        if ch == DELIMITER && (normalized.is_empty() || normalized.ends_with(DELIMITER)) {
            continue;
        }
        normalized.push(ch);
    }

    normalized
}

/// Canonicalizes a listing prefix: empty for the root, otherwise the
/// normalized key ending in exactly one delimiter.
pub fn normalize_prefix(prefix: &str) -> String {
    let normalized = normalize_key(prefix);
    let trimmed = normalized.trim_end_matches(DELIMITER);

    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}{DELIMITER}")
    }
}

/// Returns `true` for zero-byte directory marker keys.
#[inline]
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

/// Archive path of `key` inside a folder bundle rooted at `prefix`.
///
/// Returns `None` when the key lies outside the prefix or equals it.
pub fn folder_relative_path<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|path| !path.is_empty())
}

/// Archive path of `key` inside an explicit selection made under `prefix`.
///
/// The prefix is stripped only when the key starts with it; keys outside the
/// prefix keep their full name.
pub fn selection_relative_path<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let path = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix).unwrap_or(key)
    };

    Some(path).filter(|path| !path.is_empty())
}

/// Last path segment of a key or client-supplied file name.
///
/// Accepts both `/` and `\` separators and ignores a trailing delimiter.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
}

/// Builds the case-insensitive matcher used by pattern bundles.
///
/// The folder is matched literally from the start of the key except for `*`,
/// which matches exactly one path segment; the match must end at a segment
/// boundary.
pub fn folder_pattern(folder: &str) -> StorageResult<Regex> {
    let folder = normalize_key(folder);
    let folder = folder.trim_end_matches(DELIMITER);

    if folder.is_empty() {
        return Err(StorageError::invalid_input("folder path is required"));
    }

    let escaped = regex::escape(folder).replace(r"\*", "[^/]+");
    let pattern = format!("(?i)^{escaped}(/|$)");

    Regex::new(&pattern)
        .map_err(|err| StorageError::invalid_input(format!("invalid folder pattern: {err}")))
}
