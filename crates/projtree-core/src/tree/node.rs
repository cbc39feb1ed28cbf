//! A single cached filesystem entry.

use std::cmp::Ordering;

use crate::path_key::PathKey;

/// Index of a node inside a [`NodeStore`](super::NodeStore) arena.
pub(crate) type NodeId = usize;

/// What a node represents on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A regular file (symbolic links are also reported as files).
    File,
    /// A directory.
    Directory,
    /// A directory directly under the projects root.
    ProjectRoot,
}

impl NodeKind {
    /// Returns `true` for kinds that carry children.
    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::File)
    }
}

/// One file or directory in the cached hierarchy.
///
/// A node's `key` is always `parent.key` joined with its `display_name`;
/// [`NodeStore`](super::NodeStore) keeps the two in sync across renames.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) key: PathKey,
    pub(crate) display_name: String,
    pub(crate) kind: NodeKind,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    /// Creates a detached node named after the last segment of `key`.
    ///
    /// Containers start with an empty child list; files have none.
    pub fn new(key: PathKey, kind: NodeKind) -> Self {
        let display_name = key.leaf_name().to_string();
        Self {
            key,
            display_name,
            kind,
            children: kind.is_container().then(Vec::new),
            parent: None,
        }
    }

    /// Returns the node's identity.
    pub fn key(&self) -> &PathKey {
        &self.key
    }

    /// Returns the last segment of the key.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns `true` for directories and project roots.
    pub fn is_dir(&self) -> bool {
        self.kind.is_container()
    }

    /// Number of direct children; `None` for files.
    pub fn child_count(&self) -> Option<usize> {
        self.children.as_ref().map(Vec::len)
    }

    /// Lowercase extension of a file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        if self.is_dir() {
            return None;
        }
        self.key
            .as_path()
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }

    /// Key the presentation layer maps to an icon.
    ///
    /// `"briefcase"` for project roots, `"folder"` for directories, the file
    /// extension for files, and `"file"` when there is no extension.
    pub fn icon_key(&self) -> String {
        match self.kind {
            NodeKind::ProjectRoot => "briefcase".to_string(),
            NodeKind::Directory => "folder".to_string(),
            NodeKind::File => self.extension().unwrap_or_else(|| "file".to_string()),
        }
    }

    /// Sibling ordering: containers before files, then by name.
    pub(crate) fn display_order(&self, other: &Node) -> Ordering {
        other
            .is_dir()
            .cmp(&self.is_dir())
            .then_with(|| {
                self.display_name
                    .to_lowercase()
                    .cmp(&other.display_name.to_lowercase())
            })
            .then_with(|| self.display_name.cmp(&other.display_name))
    }
}
