//! Scan filters.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Filters applied while scanning a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Allowed file extensions without the leading dot. Empty allows all.
    pub extensions: BTreeSet<String>,

    /// Glob matched against file base names.
    pub name_pattern: Option<String>,

    /// Globs matched against base names; matching entries are pruned.
    pub ignore_patterns: Vec<String>,

    /// Narrows the scan to a directory below the root.
    pub sub_path: Option<PathBuf>,

    /// Honor the root `.gitignore`.
    pub respect_ignore_file: bool,

    /// Maximum traversal depth below the scan start. `None` is unlimited.
    pub max_depth: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: BTreeSet::new(),
            name_pattern: None,
            ignore_patterns: Vec::new(),
            sub_path: None,
            respect_ignore_file: true,
            max_depth: None,
        }
    }
}

impl FilterConfig {
    /// Create filters that allow everything and honor `.gitignore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(&e.into()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Set the base-name glob.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Set the explicit ignore globs.
    #[must_use]
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Scope the scan to a directory below the root.
    #[must_use]
    pub fn with_sub_path(mut self, sub_path: impl Into<PathBuf>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }

    /// Toggle `.gitignore` handling.
    #[must_use]
    pub const fn with_ignore_file(mut self, respect: bool) -> Self {
        self.respect_ignore_file = respect;
        self
    }

    /// Limit traversal depth.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Check an extension (without the dot) against the allow-list.
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions.is_empty() || self.extensions.contains(extension)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_string()
}

/// Parse a comma-separated extension list.
///
/// Entries are trimmed, a leading `.` is dropped and empty entries are skipped.
#[must_use]
pub fn parse_extensions(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Parse a comma-separated list of glob patterns.
#[must_use]
pub fn parse_patterns(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters() {
        let filters = FilterConfig::default();
        assert!(filters.extensions.is_empty());
        assert!(filters.respect_ignore_file);
        assert!(filters.allows_extension("rs"));
        assert!(filters.allows_extension(""));
    }

    #[test]
    fn test_extension_allow_list() {
        let filters = FilterConfig::new().with_extensions([".rs", "go "]);
        assert!(filters.allows_extension("rs"));
        assert!(filters.allows_extension("go"));
        assert!(!filters.allows_extension("py"));
        assert!(!filters.allows_extension(""));
    }

    #[test]
    fn test_parse_extensions() {
        assert_eq!(parse_extensions("rs, .go,,py"), vec!["rs", "go", "py"]);
        assert!(parse_extensions("").is_empty());
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!(
            parse_patterns("target, *.lock ,"),
            vec!["target".to_string(), "*.lock".to_string()]
        );
        assert!(parse_patterns("  ").is_empty());
    }

    #[test]
    fn test_builder_chain() {
        let filters = FilterConfig::new()
            .with_name_pattern("*.rs")
            .with_ignore_patterns(["target"])
            .with_sub_path("src")
            .with_ignore_file(false)
            .with_max_depth(2);
        assert_eq!(filters.name_pattern.as_deref(), Some("*.rs"));
        assert_eq!(filters.ignore_patterns, vec!["target".to_string()]);
        assert_eq!(filters.sub_path, Some(PathBuf::from("src")));
        assert!(!filters.respect_ignore_file);
        assert_eq!(filters.max_depth, Some(2));
    }
}
