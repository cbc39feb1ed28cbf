//! File system watcher feeding the reconciler.
//!
//! Uses [`notify`] to watch the projects directory recursively and turns raw
//! backend events into [`ChangeEvent`]s on a tokio channel. The watcher
//! callback runs on notify's own thread; the channel is the hand-off point to
//! the single consumer that owns the tree.
//!
//! Backends report a rename as separate halves (`From`, then `To`, then on
//! inotify a combined `Both`). [`ChangeTranslator`] holds each `From` until
//! its partner arrives so that a rename inside the tree reaches the consumer
//! as one [`ChangeEvent::Renamed`]. A `From` whose partner never shows up was
//! moved out of the tree and becomes [`ChangeEvent::Deleted`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{CoreError, CoreResult};
use crate::event::ChangeEvent;
use crate::path_key::PathKey;

/// How long a `From` half waits for its partner before it counts as a delete.
pub const RENAME_WINDOW: Duration = Duration::from_millis(500);

/// Paired renames remembered so the trailing `Both` can be recognised.
const PAIRED_HISTORY: usize = 64;

#[derive(Debug)]
struct PendingFrom {
    seen: Instant,
    tracker: Option<usize>,
    path: PathBuf,
}

#[derive(Debug)]
struct Paired {
    tracker: Option<usize>,
    from: PathBuf,
}

impl Paired {
    fn matches(&self, tracker: Option<usize>, from: &Path) -> bool {
        match (self.tracker, tracker) {
            (Some(a), Some(b)) => a == b,
            _ => self.from == from,
        }
    }
}

/// Turns raw backend events into normalized changes, pairing rename halves.
#[derive(Debug, Default)]
pub struct ChangeTranslator {
    ignored: Option<PathBuf>,
    pending: VecDeque<PendingFrom>,
    paired: VecDeque<Paired>,
}

impl ChangeTranslator {
    /// A translator that drops every path under `ignored`.
    pub fn new(ignored: Option<PathBuf>) -> Self {
        Self {
            ignored,
            ..Self::default()
        }
    }

    /// Feeds one backend event observed at `now`.
    pub fn push(&mut self, event: &Event, now: Instant) -> Vec<ChangeEvent> {
        let tracker = event.tracker();
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.pending.push_back(PendingFrom {
                        seen: now,
                        tracker,
                        path: path.clone(),
                    });
                }
                Vec::new()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let mut out = Vec::new();
                for to in &event.paths {
                    match self.take_pending(tracker, None) {
                        Some(from) => {
                            self.remember(tracker, from.clone());
                            out.extend(self.pair(&from, to));
                        }
                        None if self.keep(to) => out.push(ChangeEvent::Created(to.clone())),
                        None => {}
                    }
                }
                out
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
                [from, to] => {
                    if let Some(i) = self.paired.iter().position(|p| p.matches(tracker, from)) {
                        self.paired.remove(i);
                        return Vec::new();
                    }
                    // Backends that only report the combined form.
                    self.take_pending(tracker, Some(from));
                    self.pair(from, to)
                }
                _ => Vec::new(),
            },
            _ => {
                // Anything else closes the pairing window so changes stay in order.
                let mut out = self.drain_pending(|_| true);
                out.extend(self.translate(event));
                out
            }
        }
    }

    /// Turns `From` halves older than [`RENAME_WINDOW`] into deletes.
    pub fn flush(&mut self, now: Instant) -> Vec<ChangeEvent> {
        self.drain_pending(|p| now.saturating_duration_since(p.seen) >= RENAME_WINDOW)
    }

    fn keep(&self, path: &Path) -> bool {
        !self.ignored.as_ref().is_some_and(|i| path.starts_with(i))
    }

    fn take_pending(&mut self, tracker: Option<usize>, from: Option<&PathBuf>) -> Option<PathBuf> {
        let index = match (tracker, from) {
            (Some(t), _) => self.pending.iter().position(|p| p.tracker == Some(t)),
            (None, Some(from)) => self.pending.iter().position(|p| &p.path == from),
            (None, None) => (!self.pending.is_empty()).then_some(0),
        }?;
        self.pending.remove(index).map(|p| p.path)
    }

    fn remember(&mut self, tracker: Option<usize>, from: PathBuf) {
        if self.paired.len() == PAIRED_HISTORY {
            self.paired.pop_front();
        }
        self.paired.push_back(Paired { tracker, from });
    }

    fn pair(&self, from: &Path, to: &Path) -> Vec<ChangeEvent> {
        match (self.keep(from), self.keep(to)) {
            (true, true) => vec![ChangeEvent::Renamed(from.to_path_buf(), to.to_path_buf())],
            (true, false) => vec![ChangeEvent::Deleted(from.to_path_buf())],
            (false, true) => vec![ChangeEvent::Created(to.to_path_buf())],
            (false, false) => Vec::new(),
        }
    }

    fn drain_pending(&mut self, expired: impl Fn(&PendingFrom) -> bool) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        while self.pending.front().is_some_and(&expired) {
            let Some(from) = self.pending.pop_front() else {
                break;
            };
            debug!(path = %from.path.display(), "rename source without target");
            if self.keep(&from.path) {
                out.push(ChangeEvent::Deleted(from.path));
            }
        }
        out
    }

    fn translate(&self, event: &Event) -> Vec<ChangeEvent> {
        let kept = event.paths.iter().filter(|p| self.keep(p));
        match event.kind {
            EventKind::Create(_) => kept.map(|p| ChangeEvent::Created(p.clone())).collect(),
            EventKind::Remove(_) => kept.map(|p| ChangeEvent::Deleted(p.clone())).collect(),
            // The backend could not tell which side this is; ask the disk.
            EventKind::Modify(ModifyKind::Name(_)) => kept
                .map(|p| {
                    if std::fs::symlink_metadata(p).is_ok() {
                        ChangeEvent::Created(p.clone())
                    } else {
                        ChangeEvent::Deleted(p.clone())
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Watches one projects directory for creates, deletes and renames.
///
/// The event stream ends when the watcher is dropped and cannot be restarted.
/// Must be started from within a tokio runtime.
pub struct ProjectWatcher {
    _watcher: RecommendedWatcher,
    flusher: JoinHandle<()>,
}

impl ProjectWatcher {
    /// Starts watching `root` recursively, sending events through `tx`.
    ///
    /// Paths under `ignored` (the clipboard holding area) are never reported.
    ///
    /// # Errors
    ///
    /// [`CoreError::Watch`] if there is no tokio runtime, the backend cannot
    /// be initialised, or the directory cannot be watched.
    pub fn start(
        root: &PathKey,
        ignored: Option<PathKey>,
        tx: UnboundedSender<ChangeEvent>,
    ) -> CoreResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Watch(format!("no tokio runtime: {e}")))?;
        let translator = Arc::new(Mutex::new(ChangeTranslator::new(
            ignored.map(PathKey::into_path_buf),
        )));

        let callback_translator = Arc::clone(&translator);
        let callback_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let mut translator = callback_translator
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    // Sent under the lock so the flusher cannot reorder changes.
                    for change in translator.push(&event, Instant::now()) {
                        trace!(?change, "filesystem change");
                        if callback_tx.send(change).is_err() {
                            // Receiver gone: the engine has shut down.
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch error: {e}"),
            }
        })?;

        watcher.watch(root.as_path(), RecursiveMode::Recursive)?;
        info!(%root, "watching for changes");

        let flusher = runtime.spawn(async move {
            let mut ticks = tokio::time::interval(RENAME_WINDOW / 2);
            loop {
                ticks.tick().await;
                let mut translator = translator.lock().unwrap_or_else(PoisonError::into_inner);
                for change in translator.flush(Instant::now()) {
                    trace!(?change, "filesystem change");
                    if tx.send(change).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            flusher,
        })
    }
}

impl Drop for ProjectWatcher {
    fn drop(&mut self) {
        self.flusher.abort();
    }
}
