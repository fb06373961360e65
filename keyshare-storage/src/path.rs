//! Helpers for the slash-separated absolute paths used by every view.
//!
//! A normalized path always starts with `/`, never ends with `/` (except the
//! root itself), contains no empty, `.` or `..` segments.

use crate::error::{StorageError, StorageResult};

/// Normalizes `path` into canonical absolute form.
///
/// `..` segments are rejected rather than resolved: a key path must never
/// escape the subtree it was derived for.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StorageError::InvalidPath(path.to_string())),
            s => {
                out.push('/');
                out.push_str(s);
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Parent directory of a normalized path. The root is its own parent.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Last segment of a normalized path. Empty for the root.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Joins a relative path onto `base` and normalizes the result.
pub fn join(base: &str, rel: &str) -> StorageResult<String> {
    normalize_path(&format!("{base}/{rel}"))
}

/// Splits a normalized path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Whether `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Path of `path` relative to `ancestor`, without a leading slash.
///
/// Returns `None` when `path` is not within `ancestor`.
pub fn relative_to<'a>(path: &'a str, ancestor: &str) -> Option<&'a str> {
    if !is_within(path, ancestor) {
        return None;
    }
    if ancestor == "/" {
        return Some(path.trim_start_matches('/'));
    }
    Some(path[ancestor.len()..].trim_start_matches('/'))
}
