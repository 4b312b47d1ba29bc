//! Path hygiene for resolved input paths.
//!
//! Upload notifications can originate from editors on any platform, so the
//! store normalizes separators before a path is recorded. The execution
//! service only understands forward slashes.

/// Replace backslash separators with forward slashes.
///
/// Idempotent; paths that are already normalized pass through unchanged.
///
/// # Examples
///
/// ```rust
/// use skein::utils::paths::normalize_separators;
///
/// assert_eq!(normalize_separators(r"data\session1\cells.tif"), "data/session1/cells.tif");
/// assert_eq!(normalize_separators("data/session1/cells.tif"), "data/session1/cells.tif");
/// ```
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
