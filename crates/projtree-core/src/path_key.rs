//! Normalized absolute paths used as node identities.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// A normalized, absolute, UTF-8 filesystem path.
///
/// Two `PathKey`s compare equal exactly when they name the same entry
/// lexically: redundant separators, `.` segments and trailing separators are
/// removed, and `..` is resolved without touching the filesystem.
///
/// # Examples
///
/// ```
/// use projtree_core::PathKey;
///
/// let key = PathKey::normalize("/p//projects/./Alpha/../Beta/").unwrap();
/// assert_eq!(key.as_path(), std::path::Path::new("/p/projects/Beta"));
/// assert_eq!(key.leaf_name(), "Beta");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(PathBuf);

impl PathKey {
    /// Normalizes `path` into a key.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] if `path` is empty, relative, or not valid UTF-8.
    pub fn normalize(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CoreError::InvalidPath("empty path".to_string()));
        }
        if !path.is_absolute() {
            return Err(CoreError::InvalidPath(format!(
                "relative path: {}",
                path.display()
            )));
        }
        if path.to_str().is_none() {
            return Err(CoreError::InvalidPath(format!(
                "non UTF-8 path: {}",
                path.display()
            )));
        }

        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    // `pop` refuses to climb above the root, which is what we want.
                    out.pop();
                }
                Component::Normal(segment) => out.push(segment),
            }
        }
        Ok(Self(out))
    }

    /// Appends a single path segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidName`] if `name` is not a valid single segment.
    pub fn join(&self, name: &str) -> CoreResult<Self> {
        if !is_valid_segment(name) {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        Ok(Self(self.0.join(name)))
    }

    /// Returns the containing directory, or `None` for the filesystem root.
    pub fn parent_of(&self) -> Option<Self> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    /// Returns the last segment. Empty for the filesystem root.
    pub fn leaf_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Returns `true` if `prefix` is this key or one of its ancestors.
    ///
    /// The comparison is segment-wise: `/a/bc` does not start with `/a/b`.
    pub fn starts_with(&self, prefix: &PathKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Replaces the leading `old_prefix` segments with `new_prefix`.
    ///
    /// Returns `None` if this key is not under `old_prefix`.
    pub fn rebase(&self, old_prefix: &PathKey, new_prefix: &PathKey) -> Option<Self> {
        let rest = self.0.strip_prefix(&old_prefix.0).ok()?;
        if rest.as_os_str().is_empty() {
            Some(new_prefix.clone())
        } else {
            Some(Self(new_prefix.0.join(rest)))
        }
    }

    /// Borrows the key as a [`Path`].
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes the key, returning the underlying [`PathBuf`].
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for PathKey {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Returns `true` if `name` can be used as a single file or directory name.
pub(crate) fn is_valid_segment(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\0') {
        return false;
    }
    #[cfg(windows)]
    if name.contains('\\') || name.contains(':') {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PathKey {
        PathKey::normalize(s).unwrap()
    }

    #[test]
    fn normalize_collapses_separators_and_dots() {
        assert_eq!(key("/p//projects/./Alpha/").as_path(), Path::new("/p/projects/Alpha"));
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(key("/p/projects/Alpha/../Beta").as_path(), Path::new("/p/projects/Beta"));
    }

    #[test]
    fn normalize_does_not_climb_above_root() {
        assert_eq!(key("/../../p").as_path(), Path::new("/p"));
    }

    #[test]
    fn normalize_is_comparison_stable() {
        assert_eq!(key("/p/projects/"), key("/p//projects"));
    }

    #[test]
    fn normalize_empty_is_invalid() {
        assert!(matches!(
            PathKey::normalize("").unwrap_err(),
            CoreError::InvalidPath(_)
        ));
    }

    #[test]
    fn normalize_relative_is_invalid() {
        assert!(matches!(
            PathKey::normalize("projects/Alpha").unwrap_err(),
            CoreError::InvalidPath(_)
        ));
    }

    #[test]
    fn join_appends_segment() {
        assert_eq!(key("/p").join("projects").unwrap(), key("/p/projects"));
    }

    #[test]
    fn join_rejects_separator_and_dots() {
        let base = key("/p");
        assert!(matches!(base.join("a/b").unwrap_err(), CoreError::InvalidName(_)));
        assert!(matches!(base.join("..").unwrap_err(), CoreError::InvalidName(_)));
        assert!(matches!(base.join("").unwrap_err(), CoreError::InvalidName(_)));
    }

    #[test]
    fn parent_and_leaf() {
        let k = key("/p/projects/Alpha/notes.txt");
        assert_eq!(k.parent_of().unwrap(), key("/p/projects/Alpha"));
        assert_eq!(k.leaf_name(), "notes.txt");
        assert!(key("/").parent_of().is_none());
        assert_eq!(key("/").leaf_name(), "");
    }

    #[test]
    fn starts_with_is_segment_aware() {
        assert!(key("/a/b/c").starts_with(&key("/a/b")));
        assert!(key("/a/b").starts_with(&key("/a/b")));
        assert!(!key("/a/bc").starts_with(&key("/a/b")));
    }

    #[test]
    fn rebase_substitutes_prefix_only() {
        // The old name "Alpha" also appears deeper in the path and must survive.
        let k = key("/p/projects/Alpha/Alpha/Alpha.txt");
        let rebased = k
            .rebase(&key("/p/projects/Alpha"), &key("/p/projects/Beta"))
            .unwrap();
        assert_eq!(rebased, key("/p/projects/Beta/Alpha/Alpha.txt"));
    }

    #[test]
    fn rebase_of_prefix_itself() {
        let rebased = key("/a/b").rebase(&key("/a/b"), &key("/a/c")).unwrap();
        assert_eq!(rebased, key("/a/c"));
    }

    #[test]
    fn rebase_outside_prefix_is_none() {
        assert!(key("/a/bc").rebase(&key("/a/b"), &key("/a/x")).is_none());
    }

    #[test]
    fn display_matches_path() {
        assert_eq!(key("/p/projects").to_string(), "/p/projects");
    }
}
