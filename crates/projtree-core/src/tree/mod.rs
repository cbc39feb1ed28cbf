//! The cached project hierarchy.
//!
//! [`NodeStore`] owns every [`Node`] and enforces the tree invariants: unique
//! keys, unique sibling names, and keys that always equal the parent key
//! joined with the display name.

pub mod node;
pub mod store;

pub use node::{Node, NodeKind};
pub use store::NodeStore;
