//! The in-memory project tree.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use super::node::{Node, NodeId, NodeKind};
use crate::error::{map_io, CoreError, CoreResult};
use crate::path_key::PathKey;

/// In-memory hierarchical cache of a directory subtree, keyed by [`PathKey`].
///
/// Nodes live in an arena; children and parents refer to each other by
/// index, so a rename only rewrites keys and never moves nodes. The root
/// (the projects directory) is created with the store and can never be
/// removed or renamed.
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    index: HashMap<PathKey, NodeId>,
    root: NodeId,
}

impl NodeStore {
    /// Creates a store holding only the root directory node.
    pub fn new(root_key: PathKey) -> Self {
        let root = Node::new(root_key.clone(), NodeKind::Directory);
        let mut index = HashMap::new();
        index.insert(root_key, 0);
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            index,
            root: 0,
        }
    }

    /// Builds a store from a recursive listing of `root_key`.
    ///
    /// At every level directories are visited before files and each group is
    /// sorted by name. Symbolic links are recorded as files and never followed.
    /// Unreadable subdirectories are kept as empty nodes.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — the root does not exist.
    /// - [`CoreError::NotADirectory`] — the root is a file.
    /// - [`CoreError::Io`] — the root cannot be listed.
    pub fn bootstrap(root_key: PathKey) -> CoreResult<Self> {
        let meta = std::fs::metadata(root_key.as_path()).map_err(|e| map_io(root_key.as_path(), e))?;
        if !meta.is_dir() {
            return Err(CoreError::NotADirectory(root_key.into_path_buf()));
        }

        let mut store = Self::new(root_key);
        let root = store.root;
        let mut created = Vec::new();
        store.scan_dir(root, &mut created)?;
        debug!(nodes = created.len(), root = %store.root_key(), "bootstrapped tree");
        Ok(store)
    }

    /// Returns the root node.
    pub fn root(&self) -> &Node {
        // The root slot is never freed.
        match self.get(self.root) {
            Some(node) => node,
            None => unreachable!("root node is never removed"),
        }
    }

    /// Returns the root key.
    pub fn root_key(&self) -> &PathKey {
        self.root().key()
    }

    /// Number of nodes below the root.
    pub fn len(&self) -> usize {
        self.index.len() - 1
    }

    /// Returns `true` when only the root is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a node with exactly this key exists.
    pub fn contains(&self, key: &PathKey) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up a node by exact key.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no node has this key.
    pub fn find(&self, key: &PathKey) -> CoreResult<&Node> {
        self.index
            .get(key)
            .and_then(|&id| self.get(id))
            .ok_or_else(|| CoreError::NotFound(key.as_path().to_path_buf()))
    }

    /// Returns the ordered children of a node (empty for files).
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no node has this key.
    pub fn children(&self, key: &PathKey) -> CoreResult<Vec<&Node>> {
        let id = self.id_of(key)?;
        Ok(self.child_ids(id).iter().filter_map(|&c| self.get(c)).collect())
    }

    /// Returns the parent node, or `None` for the root.
    pub fn parent(&self, key: &PathKey) -> CoreResult<Option<&Node>> {
        let node = self.find(key)?;
        Ok(node.parent.and_then(|p| self.get(p)))
    }

    /// Every key below the root, in depth-first pre-order following child order.
    pub fn paths(&self) -> Vec<PathKey> {
        let mut ids = Vec::new();
        for &child in self.child_ids(self.root) {
            self.collect_subtree(child, &mut ids);
        }
        ids.into_iter()
            .filter_map(|id| self.get(id).map(|n| n.key.clone()))
            .collect()
    }

    /// Inserts `node` as a child of `parent_key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ParentNotFound`] — no node has `parent_key`.
    /// - [`CoreError::NotADirectory`] — the parent is a file.
    /// - [`CoreError::InvalidPath`] — `node`'s key is not directly under `parent_key`.
    /// - [`CoreError::DuplicateKey`] — a node with the same key already exists.
    pub fn insert(&mut self, parent_key: &PathKey, node: Node) -> CoreResult<()> {
        let parent_id = *self
            .index
            .get(parent_key)
            .ok_or_else(|| CoreError::ParentNotFound(parent_key.as_path().to_path_buf()))?;
        self.insert_under(parent_id, node).map(|_| ())
    }

    /// Removes a node and its whole subtree, returning the removed keys
    /// (the node first, then descendants in pre-order).
    ///
    /// Removing a key that is not present is a no-op that returns an empty list.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] if `key` is the root.
    pub fn remove(&mut self, key: &PathKey) -> CoreResult<Vec<PathKey>> {
        let Some(&id) = self.index.get(key) else {
            debug!(%key, "remove of absent node ignored");
            return Ok(Vec::new());
        };
        if id == self.root {
            return Err(CoreError::InvalidPath(format!("cannot remove the root: {key}")));
        }

        self.detach(id);

        let mut ids = Vec::new();
        self.collect_subtree(id, &mut ids);
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.nodes[id].take() {
                self.index.remove(&node.key);
                self.free.push(id);
                removed.push(node.key);
            }
        }
        Ok(removed)
    }

    /// Renames a node in place and rewrites the keys of all its descendants.
    ///
    /// Descendant keys are rebased segment-wise: the renamed node's old key is
    /// replaced by its new key at the front of each descendant key, and
    /// nothing else in the path changes.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — no node has `key`.
    /// - [`CoreError::InvalidPath`] — `key` is the root.
    /// - [`CoreError::InvalidName`] — `new_name` is not a single valid segment.
    /// - [`CoreError::SiblingCollision`] — a sibling already has `new_name`.
    pub fn rename(&mut self, key: &PathKey, new_name: &str) -> CoreResult<PathKey> {
        let id = self.id_of(key)?;
        if id == self.root {
            return Err(CoreError::InvalidPath(format!("cannot rename the root: {key}")));
        }
        if key.leaf_name() == new_name {
            return Ok(key.clone());
        }

        let parent_key = key
            .parent_of()
            .ok_or_else(|| CoreError::InvalidPath(key.to_string()))?;
        let new_key = parent_key.join(new_name)?;
        if self.index.contains_key(&new_key) {
            return Err(CoreError::SiblingCollision {
                parent: parent_key.into_path_buf(),
                name: new_name.to_string(),
            });
        }

        let mut ids = Vec::new();
        self.collect_subtree(id, &mut ids);
        for &sub in &ids {
            if let Some(node) = self.nodes[sub].as_ref() {
                self.index.remove(&node.key);
            }
        }
        for &sub in &ids {
            if let Some(node) = self.nodes[sub].as_mut() {
                if let Some(rebased) = node.key.rebase(key, &new_key) {
                    node.key = rebased;
                }
                node.display_name = node.key.leaf_name().to_string();
                self.index.insert(node.key.clone(), sub);
            }
        }

        // The new name may belong elsewhere in the sibling order.
        if let Some(parent_id) = self.get(id).and_then(|n| n.parent) {
            self.detach(id);
            self.attach(parent_id, id);
        }

        Ok(new_key)
    }

    /// Inserts every entry found on disk under the directory `key` that the
    /// tree does not know yet, returning the inserted keys in pre-order.
    ///
    /// Existing nodes are left untouched, so calling this on an up-to-date
    /// directory is a no-op.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — no node has `key`, or the directory is gone.
    /// - [`CoreError::NotADirectory`] — the node is a file.
    pub fn merge_from_disk(&mut self, key: &PathKey) -> CoreResult<Vec<PathKey>> {
        let id = self.id_of(key)?;
        if !self.get(id).is_some_and(Node::is_dir) {
            return Err(CoreError::NotADirectory(key.as_path().to_path_buf()));
        }
        let mut created = Vec::new();
        self.scan_dir(id, &mut created)?;
        Ok(created)
    }

    /// Kind a new container under `parent_key` should have.
    pub fn container_kind_under(&self, parent_key: &PathKey) -> NodeKind {
        if parent_key == self.root_key() {
            NodeKind::ProjectRoot
        } else {
            NodeKind::Directory
        }
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn id_of(&self, key: &PathKey) -> CoreResult<NodeId> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| CoreError::NotFound(key.as_path().to_path_buf()))
    }

    fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .and_then(|n| n.children.as_deref())
            .unwrap_or_default()
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in self.child_ids(id) {
            self.collect_subtree(child, out);
        }
    }

    fn insert_under(&mut self, parent_id: NodeId, mut node: Node) -> CoreResult<NodeId> {
        let parent = self
            .get(parent_id)
            .ok_or_else(|| CoreError::ParentNotFound(node.key.as_path().to_path_buf()))?;
        if !parent.is_dir() {
            return Err(CoreError::NotADirectory(parent.key.as_path().to_path_buf()));
        }
        if node.key.parent_of().as_ref() != Some(&parent.key) {
            return Err(CoreError::InvalidPath(format!(
                "{} is not a direct child of {}",
                node.key, parent.key
            )));
        }
        if self.index.contains_key(&node.key) {
            return Err(CoreError::DuplicateKey(node.key.into_path_buf()));
        }

        node.display_name = node.key.leaf_name().to_string();
        node.parent = Some(parent_id);
        node.children = node.kind.is_container().then(Vec::new);

        let key = node.key.clone();
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, id);
        self.attach(parent_id, id);
        Ok(id)
    }

    /// Places `id` among `parent_id`'s children at its sorted position.
    fn attach(&mut self, parent_id: NodeId, id: NodeId) {
        let pos = match self.get(id) {
            Some(node) => self.child_ids(parent_id).partition_point(|&sibling| {
                self.get(sibling)
                    .is_some_and(|s| s.display_order(node).is_lt())
            }),
            None => return,
        };
        if let Some(children) = self.nodes[parent_id]
            .as_mut()
            .and_then(|p| p.children.as_mut())
        {
            children.insert(pos, id);
        }
        if let Some(node) = self.nodes[id].as_mut() {
            node.parent = Some(parent_id);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent_id) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(children) = self.nodes[parent_id]
            .as_mut()
            .and_then(|p| p.children.as_mut())
        {
            children.retain(|&c| c != id);
        }
    }

    fn scan_dir(&mut self, dir_id: NodeId, created: &mut Vec<PathKey>) -> CoreResult<()> {
        let Some(dir) = self.get(dir_id) else {
            return Ok(());
        };
        let dir_key = dir.key.clone();
        let listing = list_dir(dir_key.as_path()).map_err(|e| map_io(dir_key.as_path(), e))?;

        let container_kind = if dir_id == self.root {
            NodeKind::ProjectRoot
        } else {
            NodeKind::Directory
        };

        for (name, is_dir) in listing {
            let key = dir_key.join(&name)?;
            let child_id = match self.index.get(&key) {
                Some(&existing) => existing,
                None => {
                    let kind = if is_dir { container_kind } else { NodeKind::File };
                    let id = self.insert_under(dir_id, Node::new(key.clone(), kind))?;
                    created.push(key.clone());
                    id
                }
            };

            if is_dir && self.get(child_id).is_some_and(Node::is_dir) {
                if let Err(e) = self.scan_dir(child_id, created) {
                    warn!(%key, error = %e, "skipping unreadable directory");
                }
            }
        }
        Ok(())
    }
}

/// Lists a directory as `(name, is_dir)` pairs: directories first, then
/// files, each sorted by name. Entries with non UTF-8 names are skipped.
fn list_dir(path: &Path) -> std::io::Result<Vec<(String, bool)>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for dir_entry in std::fs::read_dir(path)? {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        // `file_type` does not follow symlinks, so a linked directory lands in `files`.
        let file_type = match dir_entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        let Some(name) = dir_entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %dir_entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        if file_type.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }

    dirs.sort_by_key(|n| n.to_lowercase());
    files.sort_by_key(|n| n.to_lowercase());
    Ok(dirs
        .into_iter()
        .map(|n| (n, true))
        .chain(files.into_iter().map(|n| (n, false)))
        .collect())
}
