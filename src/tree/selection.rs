//! Frozen selections handed to the aggregation pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::arena::{ChildLoader, FileTree, NodeId};
use crate::scanner::Entry;
use crate::tokens::estimate_tokens_from_size;

/// One selected path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Absolute path, or a path relative to the pipeline's base directory.
    pub path: PathBuf,
    /// Directories are skipped by the pipeline.
    pub is_dir: bool,
    /// Size in bytes at scan time.
    pub size: u64,
}

impl SelectedFile {
    /// A file with unknown size.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size: 0,
        }
    }
}

impl From<&Entry> for SelectedFile {
    fn from(entry: &Entry) -> Self {
        Self {
            path: entry.path.clone(),
            is_dir: entry.is_dir,
            size: entry.size,
        }
    }
}

/// Owned snapshot of the selected files. Later changes to the tree do not
/// affect it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    files: Vec<SelectedFile>,
}

impl Selection {
    /// Wrap a list of selected paths.
    #[must_use]
    pub const fn new(files: Vec<SelectedFile>) -> Self {
        Self { files }
    }

    /// Select paths relative to `root`.
    #[must_use]
    pub fn from_relative_paths<I, S>(root: &Path, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let files = paths
            .into_iter()
            .map(|p| {
                let path = root.join(p.as_ref());
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                SelectedFile {
                    path,
                    is_dir: false,
                    size,
                }
            })
            .collect();
        Self { files }
    }

    /// Selected paths.
    #[must_use]
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    /// Number of selected paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of file sizes at scan time.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().filter(|f| !f.is_dir).map(|f| f.size).sum()
    }

    /// Heuristic token estimate for the whole selection.
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens_from_size(self.total_size())
    }
}

impl FileTree {
    /// Select nodes by root-relative path. Returns the number of paths found.
    pub fn select_paths<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = 0;
        for path in paths {
            match self.find(path.as_ref()) {
                Some(id) => {
                    self.set_selected(id, true);
                    found += 1;
                }
                None => tracing::warn!(path = path.as_ref(), "Selected path not in tree"),
            }
        }
        found
    }

    /// Select every node.
    pub fn select_all(&mut self) {
        for id in self.roots().to_vec() {
            self.set_selected(id, true);
        }
    }

    /// Selected files among the loaded nodes, in display order.
    #[must_use]
    pub fn selected_files(&self) -> Vec<&Entry> {
        self.preorder()
            .into_iter()
            .map(|id| self.entry(id))
            .filter(|e| e.selected && !e.is_dir)
            .collect()
    }

    /// Expand every selected directory that is not loaded yet, then snapshot
    /// the selected files.
    ///
    /// A directory that fails to expand is logged and left out.
    pub fn freeze_selection(&mut self, loader: &dyn ChildLoader) -> Selection {
        let mut attempted: HashSet<NodeId> = HashSet::new();

        loop {
            let pending: Vec<NodeId> = self
                .preorder()
                .into_iter()
                .filter(|&id| {
                    let node = self.node(id);
                    node.entry.is_dir
                        && node.entry.selected
                        && !node.is_loaded()
                        && !attempted.contains(&id)
                })
                .collect();

            if pending.is_empty() {
                break;
            }

            for id in pending {
                attempted.insert(id);
                if let Err(e) = self.expand(id, loader) {
                    tracing::warn!(
                        path = %self.entry(id).relative_path,
                        error = %e,
                        "Failed to load selected directory"
                    );
                }
            }
        }

        let files = self
            .selected_files()
            .into_iter()
            .map(SelectedFile::from)
            .collect();
        Selection::new(files)
    }
}
