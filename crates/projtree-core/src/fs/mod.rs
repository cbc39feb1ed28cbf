//! Filesystem side of user actions.
//!
//! [`ops`] holds the blocking primitives (copy, move, delete, rename) and
//! [`executor::FileOpExecutor`] wraps them with clipboard semantics,
//! timeouts and cancellation.

pub mod clipboard;
pub mod executor;
pub mod ops;

pub use clipboard::ClipboardSlot;
pub use executor::{CancelHandle, FileOpExecutor};
