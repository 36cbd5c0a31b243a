//! Gitignore-compatible path matching.
//!
//! This module provides:
//! - Compilation of ignore-file lines into ordered [`IgnoreRule`]s
//! - Per-rule matching with four strategies (see [`RuleKind`])
//! - [`IgnoreMatcher`], the "last matching rule wins" verdict over a rule list

mod rule;

use std::path::{Component, Path};

pub use rule::{compile, matches, IgnoreRule, RuleKind};

use crate::Result;

/// Name of the ignore file read from the scan root.
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Ordered set of compiled ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Compile a matcher from ignore-file lines.
    #[must_use]
    pub fn compile<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: compile(lines),
        }
    }

    /// Load and compile an ignore file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::compile(content.lines()))
    }

    /// Load the `.gitignore` at `root`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = root.as_ref().join(IGNORE_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }

        let matcher = Self::from_file(&path)?;
        tracing::debug!(
            path = %path.display(),
            rules = matcher.rules.len(),
            "Compiled ignore file"
        );
        Ok(Some(matcher))
    }

    /// Compiled rules in source order.
    #[must_use]
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// True if no rules were compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether a `/`-separated relative path is excluded.
    ///
    /// Every rule is evaluated in order and each match overrides the previous
    /// verdict, so the last matching rule wins. No match means included.
    #[must_use]
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        self.rules.iter().fold(false, |ignored, rule| {
            if rule.matches(relative_path, is_dir) {
                !rule.is_negated()
            } else {
                ignored
            }
        })
    }

    /// Whether `relative_path` or any directory above it is excluded.
    ///
    /// For paths that did not come from a pruned walk. A file under an
    /// excluded directory stays excluded even if a later rule negates it.
    #[must_use]
    pub fn is_excluded(&self, relative_path: &str, is_dir: bool) -> bool {
        relative_path
            .match_indices('/')
            .any(|(i, _)| self.is_ignored(&relative_path[..i], true))
            || self.is_ignored(relative_path, is_dir)
    }

    /// Like [`Self::is_ignored`], for a native relative path.
    #[must_use]
    pub fn is_path_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.is_ignored(&to_slash(relative_path), is_dir)
    }
}

/// Render a relative path with `/` separators, dropping `.` components.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(name) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&name.to_string_lossy());
        }
    }
    out
}
