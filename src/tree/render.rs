//! Plain-text tree rendering.

use std::fmt::Write;

use super::arena::{FileTree, NodeId};
use crate::tokens::format_token_count;

impl FileTree {
    /// Render the loaded tree, one node per line, with token estimates.
    ///
    /// Directories end with `/`, unloaded directories with `/…`, and selected
    /// nodes are marked `[x]`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for &root in self.roots() {
            self.render_node(root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        let entry = &node.entry;
        let mark = if entry.selected { "[x]" } else { "[ ]" };
        let suffix = match (entry.is_dir, node.is_loaded()) {
            (false, _) => "",
            (true, true) => "/",
            (true, false) => "/…",
        };
        let _ = writeln!(
            out,
            "{indent}{mark} {name}{suffix} [{tokens} tokens]",
            indent = "    ".repeat(depth),
            name = entry.name,
            tokens = format_token_count(entry.token_count),
        );
        for &child in node.children() {
            self.render_node(child, depth + 1, out);
        }
    }
}
