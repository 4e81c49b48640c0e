//! Path canonicalization shared by the router and its callers.

use std::borrow::Cow;

mod hierarchy;

pub use hierarchy::PathHierarchy;

/// Returns true when `path` is already canonical.
///
/// Canonical paths start with `/`, contain no empty segments or backslashes
/// and carry no trailing slash (the root `/` excepted).
///
/// ```
/// use lumen_router::path::is_canonical;
///
/// assert!(is_canonical("/"));
/// assert!(is_canonical("/todos/42"));
/// assert!(!is_canonical("/todos/"));
/// assert!(!is_canonical("todos"));
/// assert!(!is_canonical("/a//b"));
/// ```
pub fn is_canonical(path: &str) -> bool {
    if !path.starts_with('/') || path.contains("//") || path.contains('\\') {
        return false;
    }
    path == "/" || !path.ends_with('/')
}

/// Brings a request path into canonical form.
///
/// Borrows when nothing needs to change.
///
/// ```
/// use lumen_router::path::normalize_path;
///
/// assert_eq!(normalize_path("/todos/"), "/todos");
/// assert_eq!(normalize_path("//todos///42"), "/todos/42");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let joined = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{joined}"))
    }
}

/// Splits a canonical path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}
