//! projtree core library: a live, in-memory tree of a projects folder.
//!
//! `projtree-core` keeps a cached hierarchy of `<root>/projects` in step with
//! the filesystem and performs user-initiated file operations with clipboard
//! semantics. It has no UI; frontends send [`Command`]s and receive
//! [`TreeEvent`]s.
//!
//! # Modules
//!
//! - [`path_key`] — [`PathKey`], the normalized absolute path that identifies a node.
//! - [`tree`] — [`NodeStore`], the arena-backed cached hierarchy.
//! - [`reconcile`] — [`Reconciler`], which applies [`ChangeEvent`]s to the store.
//! - [`watch`] — [`ProjectWatcher`], a `notify` watcher producing [`ChangeEvent`]s.
//! - [`fs`] — file primitives and the [`FileOpExecutor`] (cut/copy/paste/delete/rename).
//! - [`engine`] — [`Engine`], the single owner serializing commands and changes.
//! - [`layout`] — the `projects/`, `images/`, `tmp/` root layout.
//! - [`config`] — TOML configuration.
//! - [`event`] — messages crossing the core's boundaries.
//! - [`error`] — unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fs;
pub mod layout;
pub mod path_key;
pub mod reconcile;
pub mod tree;
pub mod watch;

pub use config::Config;
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use event::{ChangeEvent, Command, TreeEvent};
pub use fs::{CancelHandle, ClipboardSlot, FileOpExecutor};
pub use layout::Layout;
pub use path_key::PathKey;
pub use reconcile::{ApplyError, Reconciler};
pub use tree::{Node, NodeKind, NodeStore};
pub use watch::{ChangeTranslator, ProjectWatcher};
