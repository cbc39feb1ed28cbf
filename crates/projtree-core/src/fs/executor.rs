//! User-initiated file operations with clipboard semantics.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clipboard::ClipboardSlot;
use super::ops;
use crate::error::{map_io, CoreError, CoreResult};
use crate::path_key::PathKey;

/// How many times a holding-area collision is cleaned up and retried.
const HOLDING_RETRIES: usize = 1;

/// Cancels whatever blocking operation the executor is currently running.
///
/// Cancellation is cooperative: a recursive copy notices it between two file
/// copies and stops, leaving its partial output in place.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<Mutex<CancellationToken>>);

impl CancelHandle {
    /// Requests cancellation of the in-flight operation, if any.
    pub fn cancel(&self) {
        self.current().cancel();
    }

    fn current(&self) -> CancellationToken {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Installs and returns a fresh token for the next operation.
    fn fresh(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }
}

/// Performs cut/copy/paste/delete/rename against the real filesystem.
///
/// Each call runs its blocking I/O on tokio's blocking pool and waits at most
/// `timeout` for it. The executor exclusively owns the [`ClipboardSlot`].
#[derive(Debug)]
pub struct FileOpExecutor {
    holding_area: PathKey,
    timeout: Duration,
    clipboard: Option<ClipboardSlot>,
    cancel: CancelHandle,
}

impl FileOpExecutor {
    /// Creates an executor that parks cut/copied items in `holding_area`.
    pub fn new(holding_area: PathKey, timeout: Duration) -> Self {
        Self {
            holding_area,
            timeout,
            clipboard: None,
            cancel: CancelHandle::default(),
        }
    }

    /// The current clipboard content.
    pub fn clipboard(&self) -> Option<&ClipboardSlot> {
        self.clipboard.as_ref()
    }

    pub fn holding_area(&self) -> &PathKey {
        &self.holding_area
    }

    /// A handle that cancels the operation in flight.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Moves `source` into the holding area and records it as cut.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — `source` does not exist.
    /// - [`CoreError::InvalidPath`] — `source` is inside the holding area.
    /// - [`CoreError::MoveConflict`] — the holding slot stayed occupied after one cleanup.
    /// - [`CoreError::IoTimeout`] — the move did not finish in time.
    pub async fn cut(&mut self, source: &PathKey) -> CoreResult<ClipboardSlot> {
        let held = self.holding_path_for(source)?;
        let (src, dest) = (source.as_path().to_path_buf(), held.as_path().to_path_buf());
        self.run_blocking("cut", move |_| {
            place_in_holding(&dest, |target| ops::move_entry(&src, target))
        })
        .await?;

        info!(%source, held = %held, "cut to holding area");
        Ok(self.fill_clipboard(held, true))
    }

    /// Copies `source` into the holding area and records it as copied.
    ///
    /// Directories are duplicated recursively; the original stays in place.
    ///
    /// # Errors
    ///
    /// As [`cut`](Self::cut), plus [`CoreError::CopyFailed`] and
    /// [`CoreError::Cancelled`] from the recursive copy.
    pub async fn copy(&mut self, source: &PathKey) -> CoreResult<ClipboardSlot> {
        let held = self.holding_path_for(source)?;
        let (src, dest) = (source.as_path().to_path_buf(), held.as_path().to_path_buf());
        self.run_blocking("copy", move |cancel| {
            place_in_holding(&dest, |target| ops::copy_entry(&src, target, &cancel))
        })
        .await?;

        info!(%source, held = %held, "copied to holding area");
        Ok(self.fill_clipboard(held, false))
    }

    /// Pastes the clipboard item into `destination` and returns its new key.
    ///
    /// If `destination` is a file or a symlink, its containing directory is
    /// used; links are never followed. The item keeps its original name.
    /// After a successful paste the held copy is deleted and the clipboard
    /// cleared, for cut and copy alike.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ClipboardEmpty`] — nothing was cut or copied.
    /// - [`CoreError::NotFound`] — `destination` or the held item is gone.
    /// - [`CoreError::DestinationExists`] — the name is taken; nothing is touched.
    /// - [`CoreError::CopyFailed`], [`CoreError::Cancelled`], [`CoreError::IoTimeout`].
    pub async fn paste(&mut self, destination: &PathKey) -> CoreResult<PathKey> {
        let slot = self.clipboard.clone().ok_or(CoreError::ClipboardEmpty)?;
        let held = slot.source_path.as_path().to_path_buf();
        let destination = destination.as_path().to_path_buf();
        let name = slot.leaf_name().to_string();

        let target = self
            .run_blocking("paste", move |cancel| {
                let meta =
                    std::fs::symlink_metadata(&destination).map_err(|e| map_io(&destination, e))?;
                let dir = if meta.is_dir() {
                    destination.as_path()
                } else {
                    destination
                        .parent()
                        .ok_or_else(|| CoreError::NotADirectory(destination.clone()))?
                };
                let target = dir.join(&name);
                if std::fs::symlink_metadata(&target).is_ok() {
                    return Err(CoreError::DestinationExists(target));
                }
                ops::copy_entry(&held, &target, &cancel)?;
                ops::delete_entry(&held)?;
                Ok(target)
            })
            .await?;

        self.clipboard = None;
        let target = PathKey::normalize(target)?;
        info!(target = %target, was_cut = slot.is_cut, "pasted");
        Ok(target)
    }

    /// Deletes a file or a whole directory. A missing target is not an error.
    ///
    /// Returns `false` if there was nothing to delete.
    pub async fn remove(&mut self, key: &PathKey) -> CoreResult<bool> {
        let path = key.as_path().to_path_buf();
        let deleted = self
            .run_blocking("delete", move |_| ops::delete_entry(&path))
            .await?;
        if deleted {
            info!(%key, "deleted");
        } else {
            debug!(%key, "delete target already gone");
        }
        Ok(deleted)
    }

    /// Renames `key` within its parent directory and returns the new key.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] — `key` does not exist.
    /// - [`CoreError::InvalidName`] — `new_name` is not a single valid segment.
    /// - [`CoreError::RenameConflict`] — the name is taken (not retried).
    /// - [`CoreError::RenameFailed`] — the filesystem refused.
    pub async fn rename(&mut self, key: &PathKey, new_name: &str) -> CoreResult<PathKey> {
        let path = key.as_path().to_path_buf();
        let name = new_name.to_string();
        let new_path = self
            .run_blocking("rename", move |_| ops::rename_entry(&path, &name))
            .await?;
        let new_key = PathKey::normalize(new_path)?;
        info!(from = %key, to = %new_key, "renamed");
        Ok(new_key)
    }

    fn holding_path_for(&self, source: &PathKey) -> CoreResult<PathKey> {
        if source.starts_with(&self.holding_area) || self.holding_area.starts_with(source) {
            return Err(CoreError::InvalidPath(format!(
                "{source} overlaps the holding area"
            )));
        }
        self.holding_area.join(source.leaf_name())
    }

    fn fill_clipboard(&mut self, held: PathKey, is_cut: bool) -> ClipboardSlot {
        let slot = ClipboardSlot {
            source_path: held,
            is_cut,
        };
        self.clipboard = Some(slot.clone());
        slot
    }

    /// Runs `f` on the blocking pool, bounded by the executor's timeout.
    ///
    /// On timeout the operation's token is cancelled so a recursive copy stops
    /// at its next file.
    async fn run_blocking<T, F>(&self, operation: &str, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> CoreResult<T> + Send + 'static,
    {
        let token = self.cancel.fresh();
        let task = tokio::task::spawn_blocking({
            let token = token.clone();
            move || f(token)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{operation} task failed: {join_err}"),
            ))),
            Err(_) => {
                token.cancel();
                Err(CoreError::IoTimeout {
                    operation: operation.to_string(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

/// Runs `place` into `slot`; if the slot is occupied, deletes the occupant
/// and retries at most [`HOLDING_RETRIES`] times.
fn place_in_holding(
    slot: &Path,
    mut place: impl FnMut(&Path) -> CoreResult<()>,
) -> CoreResult<()> {
    let mut attempt = 0;
    loop {
        match place(slot) {
            Ok(()) => return Ok(()),
            Err(CoreError::DestinationExists(occupied)) => {
                if attempt == HOLDING_RETRIES {
                    return Err(CoreError::MoveConflict(occupied));
                }
                debug!(slot = %occupied.display(), "holding slot occupied, clearing it");
                ops::delete_entry(&occupied)?;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        projects: PathBuf,
        exec: FileOpExecutor,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let projects = tmp.path().join("projects");
        let holding = tmp.path().join("tmp");
        fs::create_dir_all(projects.join("Alpha/src")).unwrap();
        fs::create_dir_all(projects.join("Beta")).unwrap();
        fs::create_dir_all(&holding).unwrap();
        fs::write(projects.join("Alpha/notes.txt"), "notes").unwrap();
        fs::write(projects.join("Alpha/src/main.rs"), "fn main() {}").unwrap();

        let exec = FileOpExecutor::new(
            PathKey::normalize(&holding).unwrap(),
            Duration::from_secs(10),
        );
        Fixture {
            _tmp: tmp,
            projects,
            exec,
        }
    }

    fn key(p: impl AsRef<std::path::Path>) -> PathKey {
        PathKey::normalize(p).unwrap()
    }

    #[tokio::test]
    async fn cut_then_paste_moves_the_item() {
        let mut fx = fixture();
        let source = fx.projects.join("Alpha/notes.txt");

        let slot = fx.exec.cut(&key(&source)).await.unwrap();
        assert!(slot.is_cut);
        assert!(!source.exists());
        assert!(slot.source_path.as_path().exists());

        let pasted = fx.exec.paste(&key(fx.projects.join("Beta"))).await.unwrap();
        assert_eq!(pasted, key(fx.projects.join("Beta/notes.txt")));
        assert_eq!(fs::read_to_string(pasted.as_path()).unwrap(), "notes");
        assert!(!source.exists());
        assert!(!slot.source_path.as_path().exists());
        assert!(fx.exec.clipboard().is_none());
    }

    #[tokio::test]
    async fn copy_then_paste_keeps_the_source() {
        let mut fx = fixture();
        let source = fx.projects.join("Alpha/src");

        let slot = fx.exec.copy(&key(&source)).await.unwrap();
        assert!(!slot.is_cut);

        let pasted = fx.exec.paste(&key(fx.projects.join("Beta"))).await.unwrap();
        assert!(source.join("main.rs").exists());
        assert!(pasted.as_path().join("main.rs").exists());
        assert!(!slot.source_path.as_path().exists());
    }

    #[tokio::test]
    async fn paste_onto_file_uses_its_directory() {
        let mut fx = fixture();
        fs::write(fx.projects.join("Beta/readme.md"), "").unwrap();
        fx.exec
            .copy(&key(fx.projects.join("Alpha/notes.txt")))
            .await
            .unwrap();

        let pasted = fx
            .exec
            .paste(&key(fx.projects.join("Beta/readme.md")))
            .await
            .unwrap();
        assert_eq!(pasted, key(fx.projects.join("Beta/notes.txt")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn paste_onto_symlink_uses_its_directory() {
        let mut fx = fixture();
        let link = fx.projects.join("Alpha/to_beta");
        std::os::unix::fs::symlink(fx.projects.join("Beta"), &link).unwrap();
        fx.exec
            .copy(&key(fx.projects.join("Alpha/src/main.rs")))
            .await
            .unwrap();

        let pasted = fx.exec.paste(&key(&link)).await.unwrap();
        assert_eq!(pasted, key(fx.projects.join("Alpha/main.rs")));
        assert!(!fx.projects.join("Beta/main.rs").exists());
    }

    #[tokio::test]
    async fn paste_onto_existing_name_fails_and_touches_nothing() {
        let mut fx = fixture();
        fs::write(fx.projects.join("Beta/notes.txt"), "other").unwrap();
        let slot = fx
            .exec
            .copy(&key(fx.projects.join("Alpha/notes.txt")))
            .await
            .unwrap();

        let err = fx
            .exec
            .paste(&key(fx.projects.join("Beta")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DestinationExists(_)));
        assert_eq!(
            fs::read_to_string(fx.projects.join("Beta/notes.txt")).unwrap(),
            "other"
        );
        assert!(fx.projects.join("Alpha/notes.txt").exists());
        assert!(slot.source_path.as_path().exists());
        assert_eq!(fx.exec.clipboard(), Some(&slot));
    }

    #[tokio::test]
    async fn paste_with_empty_clipboard_fails() {
        let mut fx = fixture();
        let err = fx
            .exec
            .paste(&key(fx.projects.join("Beta")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ClipboardEmpty));
    }

    #[tokio::test]
    async fn holding_collision_is_cleared_and_retried_once() {
        let mut fx = fixture();
        let stale = fx.exec.holding_area().as_path().join("notes.txt");
        fs::write(&stale, "stale").unwrap();

        let slot = fx
            .exec
            .copy(&key(fx.projects.join("Alpha/notes.txt")))
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(slot.source_path.as_path()).unwrap(),
            "notes"
        );
    }

    #[tokio::test]
    async fn second_copy_replaces_clipboard() {
        let mut fx = fixture();
        fx.exec
            .copy(&key(fx.projects.join("Alpha/notes.txt")))
            .await
            .unwrap();
        let second = fx
            .exec
            .cut(&key(fx.projects.join("Alpha/src")))
            .await
            .unwrap();
        assert_eq!(fx.exec.clipboard(), Some(&second));
    }

    #[test]
    fn persistent_collision_is_a_move_conflict() {
        let tmp = TempDir::new().unwrap();
        let slot = tmp.path().join("slot");
        let mut calls = 0;
        let result = place_in_holding(&slot, |target| {
            calls += 1;
            Err(CoreError::DestinationExists(target.to_path_buf()))
        });
        assert!(matches!(result.unwrap_err(), CoreError::MoveConflict(_)));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn cut_inside_holding_area_is_refused() {
        let mut fx = fixture();
        let inside = fx.exec.holding_area().join("x").unwrap();
        let err = fx.exec.cut(&inside).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn cut_missing_source_fails() {
        let mut fx = fixture();
        let err = fx
            .exec
            .cut(&key(fx.projects.join("Alpha/nope.txt")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert!(fx.exec.clipboard().is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let mut fx = fixture();
        let target = key(fx.projects.join("Alpha"));
        assert!(fx.exec.remove(&target).await.unwrap());
        assert!(!fx.exec.remove(&target).await.unwrap());
    }

    #[tokio::test]
    async fn rename_returns_new_key() {
        let mut fx = fixture();
        let new_key = fx
            .exec
            .rename(&key(fx.projects.join("Alpha")), "Gamma")
            .await
            .unwrap();
        assert_eq!(new_key, key(fx.projects.join("Gamma")));
        assert!(fx.projects.join("Gamma/src/main.rs").exists());
    }

    #[tokio::test]
    async fn rename_conflict_is_reported() {
        let mut fx = fixture();
        let err = fx
            .exec
            .rename(&key(fx.projects.join("Alpha")), "Beta")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RenameConflict(_)));
    }

    #[tokio::test]
    async fn slow_operation_times_out_and_is_cancelled() {
        let tmp = TempDir::new().unwrap();
        let exec = FileOpExecutor::new(key(tmp.path()), Duration::from_millis(20));
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();

        let err = exec
            .run_blocking("slow", move |cancel| {
                std::thread::sleep(Duration::from_millis(200));
                let _ = seen_tx.send(cancel.is_cancelled());
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::IoTimeout { timeout_ms: 20, .. }));
        assert!(seen_rx.recv_timeout(Duration::from_secs(2)).unwrap());
    }

    #[tokio::test]
    async fn cancel_handle_reaches_running_operation() {
        let tmp = TempDir::new().unwrap();
        let exec = FileOpExecutor::new(key(tmp.path()), Duration::from_secs(5));
        let handle = exec.cancel_handle();

        let result = exec
            .run_blocking("wait", move |cancel| {
                handle.cancel();
                if cancel.is_cancelled() {
                    Err(CoreError::Cancelled)
                } else {
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result.unwrap_err(), CoreError::Cancelled));
    }
}
