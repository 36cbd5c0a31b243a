//! Directory scanner.
//!
//! Walks a root once, pruning ignored subtrees without descending into them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use super::entry::{extension_of, Entry};
use crate::config::FilterConfig;
use crate::error::ScanError;
use crate::matcher::{to_slash, IgnoreMatcher};
use crate::Result;

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub entries_found: AtomicU64,
    pub files_filtered: AtomicU64,
    pub subtrees_pruned: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            entries_found: self.entries_found.load(Ordering::Relaxed),
            files_filtered: self.files_filtered.load(Ordering::Relaxed),
            subtrees_pruned: self.subtrees_pruned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    pub entries_found: u64,
    pub files_filtered: u64,
    pub subtrees_pruned: u64,
    pub errors: u64,
}

/// Pruning predicates shared with the walker's entry filter.
#[derive(Debug)]
struct PruneRules {
    root: PathBuf,
    ignore_globs: GlobSet,
    ignore_file: Option<Arc<IgnoreMatcher>>,
}

impl PruneRules {
    fn is_pruned(&self, path: &Path, name: &str, is_dir: bool) -> bool {
        if self.ignore_globs.is_match(name) {
            return true;
        }

        if let Some(matcher) = &self.ignore_file {
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if matcher.is_path_ignored(relative, is_dir) {
                return true;
            }
        }

        false
    }
}

/// Scanner bound to one root and one set of filters.
///
/// The root ignore file is compiled once at construction and reused by every
/// scan, including scoped rescans for lazy expansion.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    filters: FilterConfig,
    prune: Arc<PruneRules>,
    name_glob: Option<GlobMatcher>,
    name_glob_invalid: bool,
}

impl DirectoryScanner {
    /// Create a scanner for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root ignore file exists but cannot be read.
    pub fn new(root: impl AsRef<Path>, filters: FilterConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let ignore_file = if filters.respect_ignore_file {
            IgnoreMatcher::from_root(&root)?.map(Arc::new)
        } else {
            None
        };

        let ignore_globs = build_globset(&filters.ignore_patterns);

        let (name_glob, name_glob_invalid) = match filters.name_pattern.as_deref() {
            Some(pattern) => match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => (Some(glob.compile_matcher()), false),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Invalid name pattern, no file will match");
                    (None, true)
                }
            },
            None => (None, false),
        };

        Ok(Self {
            filters,
            prune: Arc::new(PruneRules {
                root,
                ignore_globs,
                ignore_file,
            }),
            name_glob,
            name_glob_invalid,
        })
    }

    /// The scan root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.prune.root
    }

    /// The filters this scanner applies.
    #[must_use]
    pub const fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// The compiled root ignore file, if one was loaded.
    #[must_use]
    pub fn ignore_matcher(&self) -> Option<&IgnoreMatcher> {
        self.prune.ignore_file.as_deref()
    }

    /// Scan the root, or `filters.sub_path` below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the starting directory cannot be read. Errors on
    /// individual entries are logged and skipped.
    pub fn scan(&self) -> Result<Vec<Entry>> {
        self.scan_with_stats().map(|(entries, _)| entries)
    }

    /// Scan and also return statistics.
    ///
    /// # Errors
    ///
    /// See [`Self::scan`].
    pub fn scan_with_stats(&self) -> Result<(Vec<Entry>, ScanStatsSnapshot)> {
        let start = match &self.filters.sub_path {
            Some(sub) => self.root().join(sub),
            None => self.root().to_path_buf(),
        };
        self.walk(&start)
    }

    /// Scan the directory at `relative_dir` below the root with the same
    /// filters and ignore rules. Entry paths stay relative to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn scan_subdir(&self, relative_dir: &str) -> Result<Vec<Entry>> {
        let start = self.root().join(relative_dir);
        self.walk(&start).map(|(entries, _)| entries)
    }

    fn walk(&self, start: &Path) -> Result<(Vec<Entry>, ScanStatsSnapshot)> {
        std::fs::read_dir(start)
            .map_err(|e| ScanError::root_unreadable(start.display().to_string(), e))?;

        tracing::info!(path = %start.display(), "Starting directory scan");

        let stats = Arc::new(ScanStats::new());
        let prune = Arc::clone(&self.prune);
        let filter_stats = Arc::clone(&stats);

        let mut builder = WalkBuilder::new(start);
        builder
            .standard_filters(false)
            .follow_links(false)
            .max_depth(self.filters.max_depth)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |dent| {
                let is_dir = dent.file_type().is_some_and(|ft| ft.is_dir());
                let name = dent.file_name().to_string_lossy();
                if prune.is_pruned(dent.path(), &name, is_dir) {
                    filter_stats.subtrees_pruned.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                true
            });

        let mut entries = Vec::new();

        for result in builder.build() {
            let dent = match result {
                Ok(dent) => dent,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if dent.depth() == 0 {
                continue;
            }

            let metadata = match dent.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(path = %dent.path().display(), error = %e, "Skipping entry without metadata");
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if !metadata.is_dir() && !self.accepts_file(dent.path()) {
                stats.files_filtered.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let path = dent.path();
            let relative = to_slash(path.strip_prefix(self.root()).unwrap_or(path));
            entries.push(Entry::from_metadata(path, relative, &metadata));
            stats.entries_found.fetch_add(1, Ordering::Relaxed);
        }

        let snapshot = stats.snapshot();
        tracing::info!(
            path = %start.display(),
            found = snapshot.entries_found,
            filtered = snapshot.files_filtered,
            pruned = snapshot.subtrees_pruned,
            errors = snapshot.errors,
            "Directory scan complete"
        );

        Ok((entries, snapshot))
    }

    /// Extension allow-list and name glob. Applies to files only.
    fn accepts_file(&self, path: &Path) -> bool {
        if !self.filters.allows_extension(&extension_of(path)) {
            return false;
        }

        if self.name_glob_invalid {
            return false;
        }

        match (&self.name_glob, path.file_name()) {
            (Some(glob), Some(name)) => glob.is_match(name),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Build a glob set, skipping malformed patterns.
fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid ignore pattern"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build ignore patterns");
        GlobSet::empty()
    })
}

/// Scan `root` with `filters`.
///
/// # Errors
///
/// Returns an error if the root cannot be read.
pub fn scan_directory(root: impl AsRef<Path>, filters: &FilterConfig) -> Result<Vec<Entry>> {
    DirectoryScanner::new(root, filters.clone())?.scan()
}

/// Async version of directory scan.
///
/// # Errors
///
/// Returns an error if the root cannot be read or the scan task fails.
pub async fn scan_directory_async(root: PathBuf, filters: FilterConfig) -> Result<Vec<Entry>> {
    tokio::task::spawn_blocking(move || scan_directory(&root, &filters))
        .await
        .map_err(|e| crate::Error::internal(format!("Scan task failed: {e}")))?
}
