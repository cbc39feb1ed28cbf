//! Error types for `projtree-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::PathBuf;

/// Unified error type for all core operations.
///
/// Tree-structure variants (`ParentNotFound`, `DuplicateKey`, ...) mean the
/// cached tree disagrees with the caller's view and are always surfaced.
/// Filesystem variants are reported to the presentation layer for display.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The input is empty, relative, or otherwise not a usable absolute path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The target path or node does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// An insert named a parent that is not in the tree.
    #[error("parent not found: {0}")]
    ParentNotFound(PathBuf),

    /// A node with this key is already somewhere in the tree.
    #[error("duplicate key: {0}")]
    DuplicateKey(PathBuf),

    /// A sibling already owns the requested display name.
    #[error("a sibling named {name:?} already exists under {parent}")]
    SiblingCollision { parent: PathBuf, name: String },

    /// A directory was expected but the path points to a file.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file or directory name is invalid (empty, contains path separators, etc.).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The clipboard holding slot was still occupied after one cleanup and retry.
    #[error("holding area slot is occupied: {0}")]
    MoveConflict(PathBuf),

    /// Paste target already exists; nothing was overwritten.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Rename target already exists in the parent directory.
    #[error("rename target already exists: {0}")]
    RenameConflict(PathBuf),

    /// The filesystem refused a rename.
    #[error("failed to rename {path}: {source}")]
    RenameFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying a single file during a (recursive) duplication failed.
    #[error("failed to copy {path}: {source}")]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking filesystem call did not finish within the configured timeout.
    #[error("{operation} timed out after {timeout_ms} ms")]
    IoTimeout { operation: String, timeout_ms: u64 },

    /// Paste was requested with nothing cut or copied.
    #[error("clipboard is empty")]
    ClipboardEmpty,

    /// A selection-targeted operation ran with nothing selected.
    #[error("nothing is selected")]
    NoSelection,

    /// The operation was cancelled before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The change-notification backend failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<notify::Error> for CoreError {
    fn from(err: notify::Error) -> Self {
        CoreError::Watch(err.to_string())
    }
}

/// Convenience alias used throughout `projtree-core`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Maps an I/O error on `path` to [`CoreError::NotFound`] when it says so,
/// and to [`CoreError::Io`] otherwise.
pub(crate) fn map_io(path: &std::path::Path, err: std::io::Error) -> CoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        CoreError::NotFound(path.to_path_buf())
    } else {
        CoreError::Io(err)
    }
}
