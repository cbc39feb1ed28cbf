//! Plain-text rendering of the tree and of engine events.

use std::fmt::Write;

use projtree_core::{NodeStore, PathKey, TreeEvent};

/// Renders the whole tree, one node per line, indented by depth.
///
/// Each line carries the node's icon key in brackets so a richer frontend's
/// image lookup can be checked from the terminal.
pub fn render_tree(store: &NodeStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}/", store.root_key());
    render_children(store, store.root_key(), 1, &mut out);
    out
}

fn render_children(store: &NodeStore, key: &PathKey, depth: usize, out: &mut String) {
    let Ok(children) = store.children(key) else {
        return;
    };
    for node in children {
        let slash = if node.is_dir() { "/" } else { "" };
        let _ = writeln!(
            out,
            "{}{}{} [{}]",
            "  ".repeat(depth),
            node.display_name(),
            slash,
            node.icon_key()
        );
        if node.is_dir() {
            render_children(store, node.key(), depth + 1, out);
        }
    }
}

/// One status line for an engine event.
pub fn render_event(event: &TreeEvent) -> String {
    match event {
        TreeEvent::NodeCreated { key, kind } => format!("+ {key} ({kind:?})"),
        TreeEvent::NodeRemoved { key } => format!("- {key}"),
        TreeEvent::NodeRenamed { from, to } => format!("~ {from} -> {to}"),
        TreeEvent::OperationComplete { operation } => format!("ok: {operation}"),
        TreeEvent::OperationFailed { operation, error } => format!("error: {operation}: {error}"),
    }
}
