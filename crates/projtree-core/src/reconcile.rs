//! Applies filesystem change notifications to the cached tree.
//!
//! The reconciler is a pure consumer of filesystem truth: it never performs
//! file operations itself, only reads metadata to classify new entries. Every
//! event is applied as a minimal diff, and repeated or out-of-date events
//! (a `Deleted` for a node already gone, a `Created` for one already present)
//! settle into no-ops.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::event::{ChangeEvent, TreeEvent};
use crate::layout::Layout;
use crate::path_key::PathKey;
use crate::tree::{Node, NodeKind, NodeStore};

/// Default number of orphaned `Created` events kept for a later retry.
pub const DEFAULT_ORPHAN_BUFFER: usize = 256;

/// A change that could only be applied in part.
///
/// `applied` holds the tree events for everything that did reach the store
/// before `source` stopped the rest, so callers can still forward them.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct ApplyError {
    pub applied: Vec<TreeEvent>,
    #[source]
    pub source: CoreError,
}

/// Owns the [`NodeStore`] and keeps it in step with [`ChangeEvent`]s.
#[derive(Debug)]
pub struct Reconciler {
    store: NodeStore,
    layout: Layout,
    pending: VecDeque<PathKey>,
    pending_capacity: usize,
    orphan_count: u64,
}

impl Reconciler {
    /// Wraps `store`, whose root is `layout.projects()`. Only project
    /// content is reconciled; the holding area is ignored.
    pub fn new(store: NodeStore, layout: Layout, orphan_buffer: usize) -> Self {
        debug_assert_eq!(store.root_key(), layout.projects());
        Self {
            store,
            layout,
            pending: VecDeque::new(),
            pending_capacity: orphan_buffer,
            orphan_count: 0,
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// How many `Created` events arrived before their parent did.
    pub fn orphan_count(&self) -> u64 {
        self.orphan_count
    }

    /// Orphaned paths still waiting for their parent.
    pub fn pending_orphans(&self) -> usize {
        self.pending.len()
    }

    /// Applies one change and returns the resulting tree notifications.
    ///
    /// # Errors
    ///
    /// An [`ApplyError`] carrying the events already applied, wrapping:
    /// - [`CoreError::InvalidPath`] — an event path is relative or empty.
    /// - Store errors if the tree has desynchronized from the filesystem
    ///   beyond what duplicate or reordered events explain.
    pub fn apply(&mut self, event: ChangeEvent) -> Result<Vec<TreeEvent>, ApplyError> {
        let mut events = Vec::new();
        let result = self.apply_change(event, &mut events);

        if !events.is_empty() && !self.pending.is_empty() {
            self.retry_orphans(&mut events);
        }
        match result {
            Ok(()) => Ok(events),
            Err(source) => Err(ApplyError {
                applied: events,
                source,
            }),
        }
    }

    fn apply_change(&mut self, event: ChangeEvent, events: &mut Vec<TreeEvent>) -> CoreResult<()> {
        match event {
            ChangeEvent::Created(path) => {
                let key = PathKey::normalize(&path)?;
                if self.layout.is_project_content(&key) {
                    self.create(&key, events)?;
                }
            }
            ChangeEvent::Deleted(path) => {
                let key = PathKey::normalize(&path)?;
                if self.layout.is_project_content(&key) {
                    self.delete(&key, events)?;
                }
            }
            ChangeEvent::Renamed(from, to) => {
                let from = PathKey::normalize(&from)?;
                let to = PathKey::normalize(&to)?;
                self.rename(&from, &to, events)?;
            }
        }
        Ok(())
    }

    fn create(&mut self, key: &PathKey, events: &mut Vec<TreeEvent>) -> CoreResult<()> {
        let is_dir = match std::fs::symlink_metadata(key.as_path()) {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%key, "created entry is already gone");
                return Ok(());
            }
            Err(e) => return Err(CoreError::Io(e)),
        };

        match self.store.find(key).ok().map(Node::is_dir) {
            Some(cached_dir) if cached_dir == is_dir => {
                if is_dir {
                    self.merge(key, events)?;
                }
                return Ok(());
            }
            // Replaced by an entry of the other kind under the same name.
            Some(_) => self.delete(key, events)?,
            None => {}
        }

        let Some(parent) = key.parent_of() else {
            return Ok(());
        };
        if !self.store.contains(&parent) {
            self.buffer_orphan(key.clone());
            return Ok(());
        }

        let kind = if is_dir {
            self.store.container_kind_under(&parent)
        } else {
            NodeKind::File
        };
        self.store.insert(&parent, Node::new(key.clone(), kind))?;
        events.push(TreeEvent::NodeCreated {
            key: key.clone(),
            kind,
        });

        if is_dir {
            self.merge(key, events)?;
        }
        Ok(())
    }

    /// Pulls in whatever landed inside a directory before we saw it.
    fn merge(&mut self, key: &PathKey, events: &mut Vec<TreeEvent>) -> CoreResult<()> {
        let created = match self.store.merge_from_disk(key) {
            Ok(created) => created,
            Err(CoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        for key in created {
            if let Ok(node) = self.store.find(&key) {
                events.push(TreeEvent::NodeCreated {
                    kind: node.kind(),
                    key,
                });
            }
        }
        Ok(())
    }

    fn delete(&mut self, key: &PathKey, events: &mut Vec<TreeEvent>) -> CoreResult<()> {
        self.pending.retain(|p| !p.starts_with(key));
        let removed = self.store.remove(key)?;
        if !removed.is_empty() {
            events.push(TreeEvent::NodeRemoved { key: key.clone() });
        }
        Ok(())
    }

    fn rename(&mut self, from: &PathKey, to: &PathKey, events: &mut Vec<TreeEvent>) -> CoreResult<()> {
        let layout = &self.layout;
        match (layout.is_project_content(from), layout.is_project_content(to)) {
            (false, false) => Ok(()),
            // Moved out of the tree, e.g. cut into the holding area.
            (true, false) => self.delete(from, events),
            // Moved into the tree, e.g. restored from the holding area.
            (false, true) => self.create(to, events),
            (true, true) => {
                if !self.store.contains(from) {
                    return self.create(to, events);
                }
                if from.parent_of() != to.parent_of() {
                    self.delete(from, events)?;
                    return self.create(to, events);
                }
                if from == to {
                    return Ok(());
                }
                // The filesystem replaced whatever had the new name.
                self.delete(to, events)?;

                let new_key = self.store.rename(from, to.leaf_name())?;
                for pending in self.pending.iter_mut() {
                    if let Some(rebased) = pending.rebase(from, &new_key) {
                        *pending = rebased;
                    }
                }
                events.push(TreeEvent::NodeRenamed {
                    from: from.clone(),
                    to: new_key,
                });
                Ok(())
            }
        }
    }

    fn buffer_orphan(&mut self, key: PathKey) {
        self.orphan_count += 1;
        warn!(%key, "orphan event: parent is not in the tree yet");
        if self.pending.contains(&key) {
            return;
        }
        if self.pending.len() >= self.pending_capacity {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(key = %dropped, "orphan buffer full, dropping oldest entry");
            }
        }
        if self.pending_capacity > 0 {
            self.pending.push_back(key);
        }
    }

    /// Re-applies buffered orphans whose parent has arrived. A retry that
    /// fails is logged and dropped.
    fn retry_orphans(&mut self, events: &mut Vec<TreeEvent>) {
        loop {
            let ready = self.pending.iter().position(|key| {
                key.parent_of()
                    .is_some_and(|parent| self.store.contains(&parent))
            });
            let Some(key) = ready.and_then(|pos| self.pending.remove(pos)) else {
                return;
            };
            debug!(%key, "retrying orphaned create");
            if let Err(e) = self.create(&key, events) {
                warn!(%key, error = %e, "dropping orphan that could not be applied");
            }
        }
    }
}
