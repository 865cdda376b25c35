// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Express `path` relative to `root`.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again. This only works for paths
///   that still exist, so removed files fall back to `None`.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }

    // macOS reports events under /private/var/... for paths watched as
    // /var/..., so compare canonical forms as well.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_path_buf());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        let rel = relative_path(Path::new("/proj"), Path::new("/proj/a/b.go"));
        assert_eq!(rel, Some(PathBuf::from("a/b.go")));
    }

    #[test]
    fn root_itself_is_empty() {
        let rel = relative_path(Path::new("/proj"), Path::new("/proj"));
        assert_eq!(rel, Some(PathBuf::new()));
    }

    #[test]
    fn unrelated_missing_path_is_none() {
        let rel = relative_path(Path::new("/proj-does-not-exist"), Path::new("/elsewhere/x"));
        assert_eq!(rel, None);
    }
}
