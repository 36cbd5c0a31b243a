//! Filesystem entries produced by a scan.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tokens::estimate_tokens_from_size;

/// One file or directory found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Path on disk (the scan root joined with the relative path).
    pub path: PathBuf,
    /// `/`-separated path relative to the scan root.
    pub relative_path: String,
    /// Base name.
    pub name: String,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    /// Extension without the leading dot, empty if none.
    pub extension: String,
    /// Selection flag, owned by the selection layer.
    pub selected: bool,
    /// Estimated tokens. For directories this is the sum over loaded children.
    pub token_count: usize,
}

impl Entry {
    /// Build an entry from on-disk metadata.
    #[must_use]
    pub fn from_metadata(path: &Path, relative_path: String, metadata: &Metadata) -> Self {
        let is_dir = metadata.is_dir();
        let size = if is_dir { 0 } else { metadata.len() };
        Self::new(path.to_path_buf(), relative_path, is_dir, size)
    }

    /// Build an entry from its parts.
    #[must_use]
    pub fn new(path: PathBuf, relative_path: String, is_dir: bool, size: u64) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| relative_path.clone(), |n| n.to_string_lossy().into_owned());
        let extension = if is_dir {
            String::new()
        } else {
            extension_of(&path)
        };
        let token_count = if is_dir {
            0
        } else {
            estimate_tokens_from_size(size)
        };

        Self {
            path,
            relative_path,
            name,
            is_dir,
            size,
            extension,
            selected: false,
            token_count,
        }
    }

    /// Relative path of the parent directory, `None` at the top level.
    #[must_use]
    pub fn parent_relative_path(&self) -> Option<&str> {
        self.relative_path.rsplit_once('/').map(|(parent, _)| parent)
    }
}

/// Text after the last `.` of the file name, so dotfiles like `.env`
/// report `env`.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry() {
        let entry = Entry::new(
            PathBuf::from("/repo/src/main.rs"),
            "src/main.rs".to_string(),
            false,
            4096,
        );
        assert_eq!(entry.name, "main.rs");
        assert_eq!(entry.extension, "rs");
        assert_eq!(entry.token_count, 1024);
        assert!(!entry.selected);
        assert_eq!(entry.parent_relative_path(), Some("src"));
    }

    #[test]
    fn test_dir_entry() {
        let entry = Entry::new(PathBuf::from("/repo/src"), "src".to_string(), true, 0);
        assert!(entry.is_dir);
        assert_eq!(entry.extension, "");
        assert_eq!(entry.token_count, 0);
        assert_eq!(entry.parent_relative_path(), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/b.tar.gz")), "gz");
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".gitignore")), "gitignore");
        assert_eq!(extension_of(Path::new("config/.env")), "env");
        assert_eq!(extension_of(Path::new(".env.local")), "local");
        assert_eq!(extension_of(Path::new("trailing.")), "");
    }
}
