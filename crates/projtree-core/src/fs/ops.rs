//! Blocking filesystem primitives behind [`FileOpExecutor`](super::FileOpExecutor).
//!
//! None of these functions overwrite an existing destination; callers decide
//! whether a collision is an error or something to clean up and retry.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::{map_io, CoreError, CoreResult};
use crate::path_key::is_valid_segment;

/// Copies a file or directory (recursively) to `dest`.
///
/// Symbolic links are copied as links, never followed. `cancel` is checked
/// before every file copy; a cancelled copy leaves what it already wrote in
/// place.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if `src` does not exist.
/// - [`CoreError::DestinationExists`] if `dest` already exists.
/// - [`CoreError::CopyFailed`] naming the first file that could not be copied.
/// - [`CoreError::Cancelled`] if `cancel` fired mid-copy.
/// - [`CoreError::Io`] for directory creation and listing failures.
pub fn copy_entry(src: &Path, dest: &Path, cancel: &CancellationToken) -> CoreResult<()> {
    let meta = std::fs::symlink_metadata(src).map_err(|e| map_io(src, e))?;
    if std::fs::symlink_metadata(dest).is_ok() {
        return Err(CoreError::DestinationExists(dest.to_path_buf()));
    }

    if meta.is_dir() {
        copy_dir_recursive(src, dest, cancel)
    } else {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        copy_leaf(src, dest, meta.is_symlink(), cancel)
    }
}

/// Symlinks inside `src` are copied as links and never descended into.
fn copy_dir_recursive(src: &Path, dest: &Path, cancel: &CancellationToken) -> CoreResult<()> {
    std::fs::create_dir_all(dest)?;

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        // Use entry.file_type() which does NOT follow symlinks
        let ft = entry.file_type()?;
        if ft.is_dir() {
            dirs.push(entry.path());
        } else {
            files.push((entry.path(), ft.is_symlink()));
        }
    }

    // Subdirectories first, so the destination skeleton exists before any file lands.
    for dir in dirs {
        let target = dest.join(file_name_of(&dir));
        copy_dir_recursive(&dir, &target, cancel)?;
    }
    for (file, is_symlink) in files {
        let target = dest.join(file_name_of(&file));
        copy_leaf(&file, &target, is_symlink, cancel)?;
    }

    Ok(())
}

fn copy_leaf(
    src: &Path,
    dest: &Path,
    is_symlink: bool,
    cancel: &CancellationToken,
) -> CoreResult<()> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    let result = if is_symlink {
        copy_symlink(src, dest)
    } else {
        std::fs::copy(src, dest).map(|_| ())
    };
    result.map_err(|source| CoreError::CopyFailed {
        path: src.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> std::io::Result<()> {
    let link_target = std::fs::read_link(src)?;
    std::os::unix::fs::symlink(link_target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dest).map(|_| ())
}

fn file_name_of(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

/// Moves a file or directory to `dest`.
///
/// Attempts a fast `rename` first. If rename fails (e.g. cross-device),
/// falls back to copy + delete.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if `src` does not exist.
/// - [`CoreError::DestinationExists`] if `dest` already exists.
/// - Any error of [`copy_entry`] or [`delete_entry`] on the fallback path.
pub fn move_entry(src: &Path, dest: &Path) -> CoreResult<()> {
    std::fs::symlink_metadata(src).map_err(|e| map_io(src, e))?;
    if std::fs::symlink_metadata(dest).is_ok() {
        return Err(CoreError::DestinationExists(dest.to_path_buf()));
    }

    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_entry(src, dest, &CancellationToken::new())?;
            delete_entry(src)?;
            Ok(())
        }
    }
}

/// Deletes a file or directory (recursively).
///
/// Returns `false` if there was nothing to delete.
///
/// # Errors
///
/// [`CoreError::Io`] for any I/O failure during deletion.
pub fn delete_entry(path: &Path) -> CoreResult<bool> {
    // Use symlink_metadata: does NOT follow symlinks, avoids TOCTOU
    let meta = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(CoreError::Io(e)),
    };

    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        // Handles both regular files and symlinks
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        // Someone else got there first.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CoreError::Io(e)),
    }
}

/// Renames a file or directory within its parent directory and returns the
/// new path.
///
/// # Errors
///
/// - [`CoreError::NotFound`] if `path` does not exist.
/// - [`CoreError::InvalidName`] if `new_name` is not a single valid segment.
/// - [`CoreError::RenameConflict`] if the target name is taken.
/// - [`CoreError::RenameFailed`] if the filesystem refuses the rename.
pub fn rename_entry(path: &Path, new_name: &str) -> CoreResult<PathBuf> {
    std::fs::symlink_metadata(path).map_err(|e| map_io(path, e))?;

    if !is_valid_segment(new_name) {
        return Err(CoreError::InvalidName(new_name.to_string()));
    }

    let parent = path
        .parent()
        .ok_or_else(|| CoreError::InvalidName("no parent directory".to_string()))?;
    let new_path = parent.join(new_name);
    if new_path == path {
        return Ok(new_path);
    }
    if std::fs::symlink_metadata(&new_path).is_ok() {
        return Err(CoreError::RenameConflict(new_path));
    }

    std::fs::rename(path, &new_path).map_err(|source| CoreError::RenameFailed {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    // --- copy_entry tests ---

    #[test]
    fn copy_entry_regular() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.txt");
        let dest = tmp.path().join("dest.txt");
        fs::write(&src, "content").unwrap();

        copy_entry(&src, &dest, &token()).unwrap();

        assert!(src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn copy_entry_directory_recursive() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("src_dir");
        fs::create_dir(&src_dir).unwrap();
        fs::write(src_dir.join("a.txt"), "aaa").unwrap();
        fs::create_dir_all(src_dir.join("nested/empty")).unwrap();
        fs::write(src_dir.join("nested").join("b.txt"), "bbb").unwrap();

        let dest_dir = tmp.path().join("dest_dir");
        copy_entry(&src_dir, &dest_dir, &token()).unwrap();

        assert_eq!(fs::read_to_string(dest_dir.join("a.txt")).unwrap(), "aaa");
        assert_eq!(
            fs::read_to_string(dest_dir.join("nested").join("b.txt")).unwrap(),
            "bbb"
        );
        assert!(dest_dir.join("nested/empty").is_dir());
    }

    #[test]
    fn copy_entry_handles_deeply_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("deep");
        let mut leaf_dir = src.clone();
        for i in 0..80 {
            leaf_dir.push(format!("d{i}"));
        }
        fs::create_dir_all(&leaf_dir).unwrap();
        fs::write(leaf_dir.join("bottom.txt"), "bottom").unwrap();

        let dest = tmp.path().join("copy");
        copy_entry(&src, &dest, &token()).unwrap();

        let copied = dest.join(leaf_dir.strip_prefix(&src).unwrap()).join("bottom.txt");
        assert_eq!(fs::read_to_string(copied).unwrap(), "bottom");
    }

    #[test]
    fn copy_entry_nonexistent_src_returns_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = copy_entry(
            &tmp.path().join("nope.txt"),
            &tmp.path().join("dest.txt"),
            &token(),
        );
        assert!(matches!(result.unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn copy_entry_refuses_existing_dest() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.txt");
        let dest = tmp.path().join("dest.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        let result = copy_entry(&src, &dest, &token());
        assert!(matches!(result.unwrap_err(), CoreError::DestinationExists(_)));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
    }

    #[test]
    fn copy_entry_cancelled_leaves_partial_output() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("src_dir");
        fs::create_dir_all(src_dir.join("sub")).unwrap();
        fs::write(src_dir.join("a.txt"), "a").unwrap();

        let cancel = token();
        cancel.cancel();
        let dest_dir = tmp.path().join("dest_dir");
        let result = copy_entry(&src_dir, &dest_dir, &cancel);

        assert!(matches!(result.unwrap_err(), CoreError::Cancelled));
        // Directories are created before the first file copy checks the token.
        assert!(dest_dir.join("sub").is_dir());
        assert!(!dest_dir.join("a.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn copy_entry_unreadable_file_fails_fast_with_path() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("src_dir");
        fs::create_dir(&src_dir).unwrap();
        let locked = src_dir.join("locked.txt");
        fs::write(&locked, "secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits; nothing to assert there.
        if fs::read(&locked).is_ok() {
            return;
        }

        let result = copy_entry(&src_dir, &tmp.path().join("dest"), &token());
        match result.unwrap_err() {
            CoreError::CopyFailed { path, .. } => assert_eq!(path, locked),
            other => panic!("expected CopyFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn copy_entry_keeps_symlinks_as_links() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("src_dir");
        fs::create_dir(&src_dir).unwrap();
        fs::write(src_dir.join("target.txt"), "t").unwrap();
        std::os::unix::fs::symlink("target.txt", src_dir.join("link.txt")).unwrap();

        let dest_dir = tmp.path().join("dest_dir");
        copy_entry(&src_dir, &dest_dir, &token()).unwrap();

        let meta = fs::symlink_metadata(dest_dir.join("link.txt")).unwrap();
        assert!(meta.is_symlink());
    }

    // --- move_entry tests ---

    #[test]
    fn move_entry_regular() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.txt");
        let dest = tmp.path().join("dest.txt");
        fs::write(&src, "content").unwrap();

        move_entry(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn move_entry_directory() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("src_dir");
        fs::create_dir(&src_dir).unwrap();
        fs::write(src_dir.join("a.txt"), "aaa").unwrap();

        let dest_dir = tmp.path().join("dest_dir");
        move_entry(&src_dir, &dest_dir).unwrap();

        assert!(!src_dir.exists());
        assert_eq!(fs::read_to_string(dest_dir.join("a.txt")).unwrap(), "aaa");
    }

    #[test]
    fn move_entry_nonexistent_returns_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = move_entry(&tmp.path().join("nope.txt"), &tmp.path().join("dest.txt"));
        assert!(matches!(result.unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn move_entry_refuses_existing_dest() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.txt");
        let dest = tmp.path().join("dest.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        let result = move_entry(&src, &dest);
        assert!(matches!(result.unwrap_err(), CoreError::DestinationExists(_)));
        assert!(src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
    }

    // --- delete_entry tests ---

    #[test]
    fn delete_entry_regular() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("to_delete.txt");
        fs::write(&file, "bye").unwrap();

        assert!(delete_entry(&file).unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn delete_entry_directory_recursive() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir_to_delete");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("deep.txt"), "").unwrap();

        assert!(delete_entry(&dir).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn delete_entry_nonexistent_is_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(!delete_entry(&tmp.path().join("nope.txt")).unwrap());
    }

    // --- rename_entry tests ---

    #[test]
    fn rename_entry_regular() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("old_name.txt");
        fs::write(&file, "content").unwrap();

        let new_path = rename_entry(&file, "new_name.txt").unwrap();

        assert!(!file.exists());
        assert_eq!(new_path, tmp.path().join("new_name.txt"));
        assert_eq!(fs::read_to_string(&new_path).unwrap(), "content");
    }

    #[test]
    fn rename_entry_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("old_dir");
        fs::create_dir(&dir).unwrap();

        rename_entry(&dir, "new_dir").unwrap();

        assert!(!dir.exists());
        assert!(tmp.path().join("new_dir").is_dir());
    }

    #[test]
    fn rename_entry_nonexistent_returns_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = rename_entry(&tmp.path().join("nope.txt"), "new.txt");
        assert!(matches!(result.unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn rename_entry_invalid_names() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "").unwrap();

        for bad in ["", ".", "..", "bad/name", "bad\0name"] {
            let result = rename_entry(&file, bad);
            assert!(
                matches!(result.unwrap_err(), CoreError::InvalidName(_)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rename_entry_conflict_is_reported() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let result = rename_entry(&a, "b.txt");
        assert!(matches!(result.unwrap_err(), CoreError::RenameConflict(_)));
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
        assert!(a.exists());
    }

    #[test]
    fn rename_entry_unicode_name() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "hello").unwrap();

        let new_path = rename_entry(&file, "파일.txt").unwrap();
        assert_eq!(fs::read_to_string(&new_path).unwrap(), "hello");
    }
}
