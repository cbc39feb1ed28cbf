//! Messages crossing the core's boundaries.
//!
//! - [`ChangeEvent`] flows **watcher → core**: what changed on disk.
//! - [`Command`] flows **UI → core**: what the user asked for.
//! - [`TreeEvent`] flows **core → UI**: how the cached tree changed and how
//!   commands turned out.

use std::path::PathBuf;

use crate::path_key::PathKey;
use crate::tree::NodeKind;

/// A normalized filesystem change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An entry appeared.
    Created(PathBuf),
    /// An entry disappeared.
    Deleted(PathBuf),
    /// An entry moved from the first path to the second.
    Renamed(PathBuf, PathBuf),
}

/// An action the UI requests the core to perform.
///
/// Commands flow **UI → Core**. The core never creates commands itself.
#[derive(Debug, Clone)]
pub enum Command {
    /// Make the given path the target of the following operations.
    Select(PathBuf),
    /// Cut the selection into the clipboard.
    Cut,
    /// Copy the selection into the clipboard.
    Copy,
    /// Paste the clipboard into the selection (or the selection's directory).
    Paste,
    /// Delete the selection.
    Delete,
    /// Rename the selection.
    Rename(String),
}

impl Command {
    /// Short name used in logs and [`TreeEvent`] reports.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Select(_) => "select",
            Command::Cut => "cut",
            Command::Copy => "copy",
            Command::Paste => "paste",
            Command::Delete => "delete",
            Command::Rename(_) => "rename",
        }
    }
}

/// A notification the core sends back to the UI.
///
/// Events flow **Core → UI**. The UI uses these to update its display state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A node was added to the tree.
    NodeCreated {
        key: PathKey,
        kind: NodeKind,
    },
    /// A node (and implicitly its subtree) was removed.
    NodeRemoved {
        key: PathKey,
    },
    /// A node was renamed; its descendants moved with it.
    NodeRenamed {
        from: PathKey,
        to: PathKey,
    },
    /// A command completed successfully.
    OperationComplete {
        /// Human-readable description of the operation.
        operation: String,
    },
    /// A command failed.
    OperationFailed {
        /// Human-readable description of the operation.
        operation: String,
        /// The error message.
        error: String,
    },
}
