//! The single-item clipboard used by cut/copy/paste.

use crate::path_key::PathKey;

/// The most recent cut or copy.
///
/// `source_path` points at the item's copy inside the holding area, whose
/// leaf name is the item's original name. A new cut/copy replaces the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSlot {
    pub source_path: PathKey,
    pub is_cut: bool,
}

impl ClipboardSlot {
    /// The name the item will be pasted under.
    pub fn leaf_name(&self) -> &str {
        self.source_path.leaf_name()
    }
}
