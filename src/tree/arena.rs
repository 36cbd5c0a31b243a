//! Arena-backed entry tree.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ScanError;
use crate::scanner::{DirectoryScanner, Entry};
use crate::Result;

/// Index of a node in a [`FileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One entry plus its links. Children are owned by exactly one parent.
#[derive(Debug, Clone)]
pub struct Node {
    pub entry: Entry,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    loaded: bool,
}

impl Node {
    fn new(entry: Entry) -> Self {
        Self {
            entry,
            parent: None,
            children: Vec::new(),
            loaded: false,
        }
    }

    /// Parent node, `None` for roots.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered children.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the children of this directory have been materialized.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Source of children for lazy expansion.
pub trait ChildLoader {
    /// Return every entry below `dir`, paths relative to the same root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn load_children(&self, dir: &Entry) -> Result<Vec<Entry>>;
}

impl ChildLoader for DirectoryScanner {
    fn load_children(&self, dir: &Entry) -> Result<Vec<Entry>> {
        self.scan_subdir(&dir.relative_path)
    }
}

/// Hierarchical view over a flat entry list.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    pub(super) nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl FileTree {
    /// Build a tree from a flat entry list.
    ///
    /// Files attach to their parent directory when it is present, directories
    /// likewise. Anything left unattached becomes a root, so no entry is
    /// dropped. Siblings are sorted directories first, then by name.
    #[must_use]
    pub fn build(entries: Vec<Entry>) -> Self {
        let mut tree = Self::default();
        let roots = tree.insert_entries(entries, None);
        tree.roots = roots;
        tree.sort_siblings_of(None);
        for &root in &tree.roots.clone() {
            tree.recompute_subtree_tokens(root);
        }
        tree
    }

    /// Insert entries into the arena, returning the ids that have no parent
    /// among them. Top-level ids are attached to `under` when given.
    fn insert_entries(&mut self, entries: Vec<Entry>, under: Option<NodeId>) -> Vec<NodeId> {
        let base = self.nodes.len();
        let count = entries.len();
        self.nodes.extend(entries.into_iter().map(Node::new));
        let ids: Vec<NodeId> = (base..base + count).map(NodeId).collect();

        let mut dirs: HashMap<PathBuf, NodeId> = HashMap::new();
        for &id in &ids {
            if self.nodes[id.0].entry.is_dir {
                dirs.insert(self.nodes[id.0].entry.path.clone(), id);
            }
        }

        let mut placed = vec![false; count];
        let mut top = Vec::new();

        // Files first, then directories.
        for pass_dirs in [false, true] {
            for &id in &ids {
                if self.nodes[id.0].entry.is_dir != pass_dirs {
                    continue;
                }
                let parent = self.nodes[id.0]
                    .entry
                    .path
                    .parent()
                    .and_then(|p| dirs.get(p))
                    .copied();
                match parent {
                    Some(parent) => {
                        if self.attach(parent, id) {
                            placed[id.0 - base] = true;
                        }
                    }
                    None => {
                        top.push(id);
                        placed[id.0 - base] = true;
                    }
                }
            }
        }

        for (offset, done) in placed.iter().enumerate() {
            if !done {
                top.push(NodeId(base + offset));
            }
        }

        for &id in &ids {
            let node = &mut self.nodes[id.0];
            if node.entry.is_dir && !node.children.is_empty() {
                node.loaded = true;
            }
        }

        if let Some(under) = under {
            for &id in &top {
                self.nodes[id.0].parent = Some(under);
            }
            self.nodes[under.0].children.extend(top.iter().copied());
        }

        top
    }

    /// Link `child` under `parent` unless that would create a cycle.
    fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || self.nodes[child.0].parent.is_some() {
            return false;
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return false;
            }
            cursor = self.nodes[id.0].parent;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        true
    }

    fn sort_siblings_of(&mut self, under: Option<NodeId>) {
        let mut stack = Vec::new();
        match under {
            Some(id) => stack.push(id),
            None => {
                let mut roots = std::mem::take(&mut self.roots);
                roots.sort_by(|a, b| self.compare(*a, *b));
                stack.extend(roots.iter().copied());
                self.roots = roots;
            }
        }

        while let Some(id) = stack.pop() {
            let mut children = std::mem::take(&mut self.nodes[id.0].children);
            children.sort_by(|a, b| self.compare(*a, *b));
            stack.extend(children.iter().copied());
            self.nodes[id.0].children = children;
        }
    }

    fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        let a = &self.nodes[a.0].entry;
        let b = &self.nodes[b.0].entry;
        b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name))
    }

    /// Top-level nodes in display order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Entry by id.
    #[must_use]
    pub fn entry(&self, id: NodeId) -> &Entry {
        &self.nodes[id.0].entry
    }

    /// Children of `id`.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Find a node by its root-relative path.
    #[must_use]
    pub fn find(&self, relative_path: &str) -> Option<NodeId> {
        let wanted = relative_path.trim_matches('/');
        self.nodes
            .iter()
            .position(|n| n.entry.relative_path == wanted)
            .map(NodeId)
    }

    /// Pre-order walk over all nodes, siblings in display order.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Every entry, pre-order.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Entry> {
        self.preorder()
            .into_iter()
            .map(|id| &self.nodes[id.0].entry)
            .collect()
    }

    /// Memoized token count for `id`.
    #[must_use]
    pub fn token_count(&self, id: NodeId) -> usize {
        self.nodes[id.0].entry.token_count
    }

    /// Total tokens across all roots.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.roots.iter().map(|&id| self.token_count(id)).sum()
    }

    /// Recompute directory sums below and including `id`.
    fn recompute_subtree_tokens(&mut self, id: NodeId) -> usize {
        if !self.nodes[id.0].entry.is_dir {
            return self.nodes[id.0].entry.token_count;
        }

        let children = self.nodes[id.0].children.clone();
        let total = children
            .into_iter()
            .map(|child| self.recompute_subtree_tokens(child))
            .sum();
        self.nodes[id.0].entry.token_count = total;
        total
    }

    /// Refresh the memoized sums of every ancestor of `id`.
    fn refresh_ancestor_tokens(&mut self, id: NodeId) {
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            let total = self.nodes[parent.0]
                .children
                .iter()
                .map(|&c| self.nodes[c.0].entry.token_count)
                .sum();
            self.nodes[parent.0].entry.token_count = total;
            cursor = self.nodes[parent.0].parent;
        }
    }

    /// Materialize the children of an unloaded directory.
    ///
    /// The loader is invoked at most once per node; later calls return the
    /// cached children. New children inherit the directory's selection.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a directory or the loader fails.
    pub fn expand(&mut self, id: NodeId, loader: &dyn ChildLoader) -> Result<&[NodeId]> {
        let node = &self.nodes[id.0];
        if !node.entry.is_dir {
            return Err(ScanError::NotADirectory(node.entry.relative_path.clone()).into());
        }
        if node.loaded {
            return Ok(&self.nodes[id.0].children);
        }

        let dir_path = node.entry.path.clone();
        let entries: Vec<Entry> = loader
            .load_children(&node.entry)?
            .into_iter()
            .filter(|e| e.path != dir_path && e.path.starts_with(&dir_path))
            .collect();

        let added = self.insert_entries(entries, Some(id));
        self.nodes[id.0].loaded = true;
        self.sort_siblings_of(Some(id));

        if self.nodes[id.0].entry.selected {
            for child in added {
                self.set_selected(child, true);
            }
        }

        self.recompute_subtree_tokens(id);
        self.refresh_ancestor_tokens(id);

        tracing::debug!(
            path = %self.nodes[id.0].entry.relative_path,
            children = self.nodes[id.0].children.len(),
            "Expanded directory"
        );

        Ok(&self.nodes[id.0].children)
    }

    /// Set the selection flag on `id` and every loaded descendant.
    pub fn set_selected(&mut self, id: NodeId, selected: bool) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.entry.selected = selected;
            stack.extend(node.children.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    fn file(rel: &str, size: u64) -> Entry {
        Entry::new(PathBuf::from("/r").join(rel), rel.to_string(), false, size)
    }

    fn dir(rel: &str) -> Entry {
        Entry::new(PathBuf::from("/r").join(rel), rel.to_string(), true, 0)
    }

    fn names(tree: &FileTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree.entry(id).name.clone()).collect()
    }

    fn sample() -> Vec<Entry> {
        vec![
            file("b.txt", 40),
            dir("src"),
            file("src/main.rs", 400),
            dir("src/util"),
            file("src/util/Zeta.rs", 8),
            file("src/util/alpha.rs", 4),
            file("A.md", 4),
            dir("docs"),
        ]
    }

    #[test]
    fn test_build_directories_first_then_name() {
        let tree = FileTree::build(sample());
        assert_eq!(names(&tree, tree.roots()), vec!["docs", "src", "A.md", "b.txt"]);

        let src = tree.find("src").unwrap();
        assert_eq!(names(&tree, tree.children(src)), vec!["util", "main.rs"]);

        let util = tree.find("src/util").unwrap();
        assert_eq!(names(&tree, tree.children(util)), vec!["Zeta.rs", "alpha.rs"]);
    }

    #[test]
    fn test_round_trip_no_loss_no_duplication() {
        let entries = sample();
        let tree = FileTree::build(entries.clone());
        let flat = tree.flatten();
        assert_eq!(flat.len(), entries.len());

        let expected: HashSet<_> = entries.iter().map(|e| e.relative_path.clone()).collect();
        let actual: HashSet<_> = flat.iter().map(|e| e.relative_path.clone()).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_orphans_become_roots() {
        let tree = FileTree::build(vec![file("missing/parent.rs", 4), dir("a/b")]);
        assert_eq!(tree.roots().len(), 2);
    }

    #[test]
    fn test_each_child_has_one_parent() {
        let tree = FileTree::build(sample());
        let mut seen = HashSet::new();
        for id in tree.preorder() {
            for &child in tree.children(id) {
                assert!(seen.insert(child), "child listed twice");
                assert_eq!(tree.node(child).parent(), Some(id));
            }
        }
    }

    #[test]
    fn test_duplicate_directory_paths_are_kept() {
        let tree = FileTree::build(vec![dir("x"), dir("x")]);
        assert_eq!(tree.flatten().len(), 2);
    }

    #[test]
    fn test_token_sums() {
        let tree = FileTree::build(sample());
        let src = tree.find("src").unwrap();
        let util = tree.find("src/util").unwrap();
        assert_eq!(tree.token_count(util), 3);
        assert_eq!(tree.token_count(src), 103);
        assert_eq!(tree.token_count(tree.find("docs").unwrap()), 0);
        assert_eq!(tree.total_tokens(), 103 + 10 + 1);
    }

    struct CountingLoader {
        calls: Cell<usize>,
        entries: Vec<Entry>,
    }

    impl ChildLoader for CountingLoader {
        fn load_children(&self, _dir: &Entry) -> Result<Vec<Entry>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.entries.clone())
        }
    }

    #[test]
    fn test_expand_once_and_recompute_tokens() {
        let mut tree = FileTree::build(vec![dir("src"), dir("src/lazy"), file("src/a.rs", 8)]);
        let lazy = tree.find("src/lazy").unwrap();
        assert!(!tree.node(lazy).is_loaded());

        let loader = CountingLoader {
            calls: Cell::new(0),
            entries: vec![
                dir("src/lazy/inner"),
                file("src/lazy/inner/deep.rs", 40),
                file("src/lazy/z.rs", 400),
            ],
        };

        let children = tree.expand(lazy, &loader).unwrap().to_vec();
        assert_eq!(names(&tree, &children), vec!["inner", "z.rs"]);
        assert_eq!(tree.token_count(lazy), 110);
        assert_eq!(tree.token_count(tree.find("src").unwrap()), 112);

        tree.expand(lazy, &loader).unwrap();
        assert_eq!(loader.calls.get(), 1);
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_expand_inherits_selection() {
        let mut tree = FileTree::build(vec![dir("lazy")]);
        let lazy = tree.find("lazy").unwrap();
        tree.set_selected(lazy, true);

        let loader = CountingLoader {
            calls: Cell::new(0),
            entries: vec![file("lazy/x.rs", 4)],
        };
        tree.expand(lazy, &loader).unwrap();
        let x = tree.find("lazy/x.rs").unwrap();
        assert!(tree.entry(x).selected);
    }

    #[test]
    fn test_expand_file_is_error() {
        let mut tree = FileTree::build(vec![file("a.rs", 4)]);
        let a = tree.find("a.rs").unwrap();
        let loader = CountingLoader {
            calls: Cell::new(0),
            entries: Vec::new(),
        };
        assert!(tree.expand(a, &loader).is_err());
        assert_eq!(loader.calls.get(), 0);
    }
}
