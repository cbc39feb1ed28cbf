//! The single owner of all tree and clipboard state.
//!
//! Every mutation goes through `&mut Engine`, so user commands and watcher
//! events are applied one at a time. File operations apply their own result
//! to the tree as soon as they return; the watcher's echo of the same change
//! arrives later and settles into a no-op.

use std::path::Path;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::event::{ChangeEvent, Command, TreeEvent};
use crate::fs::{CancelHandle, ClipboardSlot, FileOpExecutor};
use crate::layout::Layout;
use crate::path_key::PathKey;
use crate::reconcile::{ApplyError, Reconciler};
use crate::tree::NodeStore;

#[derive(Debug)]
pub struct Engine {
    layout: Layout,
    reconciler: Reconciler,
    executor: FileOpExecutor,
    selection: Option<PathKey>,
}

impl Engine {
    /// Validates the configured root and builds an engine over it.
    pub fn open(config: &Config) -> CoreResult<Self> {
        let layout = Layout::ensure(&config.general.root)?;
        Self::new(layout, config)
    }

    /// Scans `layout.projects()` and builds an engine over the result.
    ///
    /// # Errors
    ///
    /// Propagates failures from the initial scan of the projects directory.
    pub fn new(layout: Layout, config: &Config) -> CoreResult<Self> {
        let store = NodeStore::bootstrap(layout.projects().clone())?;
        info!(root = %layout.projects(), nodes = store.len(), "tree loaded");

        let reconciler = Reconciler::new(store, layout.clone(), config.reconcile.orphan_buffer);
        let executor = FileOpExecutor::new(layout.holding_area().clone(), config.ops.timeout());
        Ok(Self {
            layout,
            reconciler,
            executor,
            selection: None,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn store(&self) -> &NodeStore {
        self.reconciler.store()
    }

    pub fn clipboard(&self) -> Option<&ClipboardSlot> {
        self.executor.clipboard()
    }

    /// A handle that cancels the file operation currently running.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.executor.cancel_handle()
    }

    /// Makes `path` the target of subsequent operations.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if `path` is not in the tree.
    pub fn select(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        let key = PathKey::normalize(path)?;
        self.store().find(&key)?;
        debug!(%key, "selected");
        self.selection = Some(key);
        Ok(())
    }

    pub fn selection(&self) -> Option<&PathKey> {
        self.selection.as_ref()
    }

    /// Moves the selection into the holding area.
    pub async fn cut(&mut self) -> CoreResult<Vec<TreeEvent>> {
        let key = self.movable_selection()?;
        self.executor.cut(&key).await?;
        self.selection = None;
        Ok(self.sync(ChangeEvent::Deleted(key.into_path_buf())))
    }

    /// Copies the selection into the holding area. The tree is unchanged.
    pub async fn copy(&mut self) -> CoreResult<Vec<TreeEvent>> {
        let key = self.movable_selection()?;
        self.executor.copy(&key).await?;
        Ok(Vec::new())
    }

    /// Pastes the clipboard into the selected directory, or next to the
    /// selected file.
    pub async fn paste(&mut self) -> CoreResult<Vec<TreeEvent>> {
        let destination = self.selection.clone().ok_or(CoreError::NoSelection)?;
        let target = self.executor.paste(&destination).await?;
        Ok(self.sync(ChangeEvent::Created(target.into_path_buf())))
    }

    /// Deletes the selection from disk and from the tree.
    pub async fn delete(&mut self) -> CoreResult<Vec<TreeEvent>> {
        let key = self.movable_selection()?;
        self.executor.remove(&key).await?;
        self.selection = None;
        Ok(self.sync(ChangeEvent::Deleted(key.into_path_buf())))
    }

    /// Renames the selection in place; the selection follows the new name.
    pub async fn rename(&mut self, new_name: &str) -> CoreResult<Vec<TreeEvent>> {
        let key = self.movable_selection()?;
        let new_key = self.executor.rename(&key, new_name).await?;
        let events = self.sync(ChangeEvent::Renamed(
            key.into_path_buf(),
            new_key.as_path().to_path_buf(),
        ));
        self.selection = Some(new_key);
        Ok(events)
    }

    /// Applies a change reported by the watcher.
    ///
    /// # Errors
    ///
    /// An [`ApplyError`] whose `applied` events still describe the part of
    /// the change that reached the tree.
    pub fn handle(&mut self, change: ChangeEvent) -> Result<Vec<TreeEvent>, ApplyError> {
        self.apply(change)
    }

    /// Runs one command and appends an outcome report to its tree events.
    pub async fn execute(&mut self, command: Command) -> Vec<TreeEvent> {
        let operation = command.name();
        let result = match command {
            Command::Select(path) => self.select(path).map(|()| Vec::new()),
            Command::Cut => self.cut().await,
            Command::Copy => self.copy().await,
            Command::Paste => self.paste().await,
            Command::Delete => self.delete().await,
            Command::Rename(name) => self.rename(&name).await,
        };

        match result {
            Ok(mut events) => {
                events.push(TreeEvent::OperationComplete {
                    operation: operation.to_string(),
                });
                events
            }
            Err(e) => {
                warn!(operation, error = %e, "operation failed");
                vec![TreeEvent::OperationFailed {
                    operation: operation.to_string(),
                    error: e.to_string(),
                }]
            }
        }
    }

    /// Drains commands and filesystem changes until the command channel
    /// closes or nobody listens for events any more.
    pub async fn run(
        &mut self,
        mut commands: UnboundedReceiver<Command>,
        mut changes: UnboundedReceiver<ChangeEvent>,
        events: UnboundedSender<TreeEvent>,
    ) {
        let mut watching = true;
        loop {
            let out = tokio::select! {
                // Disk changes first, so commands see an up-to-date tree.
                biased;
                change = changes.recv(), if watching => match change {
                    Some(change) => self.handle(change).unwrap_or_else(|e| {
                        warn!(error = %e, "failed to apply filesystem change");
                        e.applied
                    }),
                    None => {
                        debug!("change stream closed");
                        watching = false;
                        continue;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
            };

            for event in out {
                if events.send(event).is_err() {
                    debug!("event receiver dropped, stopping");
                    return;
                }
            }
        }
        debug!(
            orphans = self.reconciler.orphan_count(),
            pending = self.reconciler.pending_orphans(),
            "command stream closed, stopping"
        );
    }

    fn apply(&mut self, change: ChangeEvent) -> Result<Vec<TreeEvent>, ApplyError> {
        let result = self.reconciler.apply(change);
        match &result {
            Ok(events) => self.follow_selection(events),
            Err(e) => self.follow_selection(&e.applied),
        }
        result
    }

    /// Records the outcome of a file operation that already succeeded on
    /// disk. A tree that cannot take it is left for the watcher to repair.
    fn sync(&mut self, change: ChangeEvent) -> Vec<TreeEvent> {
        self.apply(change).unwrap_or_else(|e| {
            warn!(error = %e, "tree out of step after file operation");
            e.applied
        })
    }

    /// Keeps the selection pointing at a live node.
    fn follow_selection(&mut self, events: &[TreeEvent]) {
        for event in events {
            let Some(selected) = self.selection.as_ref() else {
                return;
            };
            match event {
                TreeEvent::NodeRemoved { key } if selected.starts_with(key) => {
                    self.selection = None;
                }
                TreeEvent::NodeRenamed { from, to } => {
                    if let Some(moved) = selected.rebase(from, to) {
                        self.selection = Some(moved);
                    }
                }
                _ => {}
            }
        }
    }

    /// The selection, refusing the projects root itself.
    fn movable_selection(&self) -> CoreResult<PathKey> {
        let key = self.selection.clone().ok_or(CoreError::NoSelection)?;
        if &key == self.layout.projects() {
            return Err(CoreError::InvalidPath(format!(
                "{key} is the projects root"
            )));
        }
        Ok(key)
    }
}
