//! Compiled ignore-file rules.

use globset::{GlobBuilder, GlobMatcher};

/// Matching strategy a rule was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Contains a `**` segment.
    SegmentGlob,
    /// Contains a separator; matched against the full relative path.
    RootAnchored,
    /// Has `*`, `?` or `[` but no separator; matched per segment.
    WildcardBasename,
    /// Plain name; matched per segment.
    Literal,
}

#[derive(Debug, Clone)]
enum Strategy {
    SegmentGlob {
        prefix: Option<String>,
        prefix_glob: Option<GlobMatcher>,
        suffix: Option<String>,
        suffix_glob: Option<GlobMatcher>,
        whole: Option<GlobMatcher>,
    },
    RootAnchored {
        glob: Option<GlobMatcher>,
    },
    WildcardBasename {
        glob: Option<GlobMatcher>,
    },
    Literal,
}

/// One compiled line of an ignore file.
///
/// Rules are immutable once compiled.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    raw: String,
    pattern: String,
    negated: bool,
    dir_only: bool,
    strategy: Strategy,
}

impl IgnoreRule {
    /// Compile a single ignore-file line.
    ///
    /// Returns `None` for blank lines, comments and lines that reduce to an
    /// empty pattern (a lone `!` or `/`).
    #[must_use]
    pub fn compile(line: &str) -> Option<Self> {
        let raw = line.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }

        let (negated, rest) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('\\').unwrap_or(raw)),
        };

        let (dir_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        let (leading_slash, pattern) = match rest.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        if pattern.is_empty() {
            return None;
        }

        let strategy = if pattern.contains("**") {
            let prefix = pattern.strip_suffix("/**").map(String::from);
            let suffix = pattern.strip_prefix("**/").map(String::from);
            let prefix_glob = prefix
                .as_deref()
                .filter(|p| has_glob_meta(p))
                .and_then(compile_glob);
            let suffix_glob = suffix.as_deref().and_then(compile_glob);
            Strategy::SegmentGlob {
                prefix,
                prefix_glob,
                suffix,
                suffix_glob,
                whole: compile_glob(pattern),
            }
        } else if leading_slash || pattern.contains('/') {
            let glob = if has_glob_meta(pattern) {
                compile_glob(pattern)
            } else {
                None
            };
            Strategy::RootAnchored { glob }
        } else if has_glob_meta(pattern) {
            Strategy::WildcardBasename {
                glob: compile_glob(pattern),
            }
        } else {
            Strategy::Literal
        };

        Some(Self {
            raw: raw.to_string(),
            pattern: pattern.to_string(),
            negated,
            dir_only,
            strategy,
        })
    }

    /// The line this rule was compiled from, trimmed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The pattern with negation, anchoring and directory markers removed.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a match re-includes the path.
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether the rule only applies to directories.
    #[must_use]
    pub const fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// The matching strategy this rule uses.
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        match self.strategy {
            Strategy::SegmentGlob { .. } => RuleKind::SegmentGlob,
            Strategy::RootAnchored { .. } => RuleKind::RootAnchored,
            Strategy::WildcardBasename { .. } => RuleKind::WildcardBasename,
            Strategy::Literal => RuleKind::Literal,
        }
    }

    /// Test the rule against a `/`-separated path relative to the scan root.
    ///
    /// Negation is not applied here; see [`crate::matcher::IgnoreMatcher`].
    #[must_use]
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }

        let path = path.trim_start_matches("./").trim_matches('/');
        if path.is_empty() {
            return false;
        }

        match &self.strategy {
            Strategy::SegmentGlob {
                prefix,
                prefix_glob,
                suffix,
                suffix_glob,
                whole,
            } => {
                if let Some(prefix) = prefix {
                    if is_same_or_below(path, prefix) {
                        return true;
                    }
                }
                if prefix_glob
                    .as_ref()
                    .is_some_and(|g| g.is_match(path) || any_ancestor(path, |a| g.is_match(a)))
                {
                    return true;
                }
                if let Some(suffix) = suffix {
                    if path == suffix
                        || path.ends_with(&format!("/{suffix}"))
                        || suffix_glob
                            .as_ref()
                            .is_some_and(|g| g.is_match(base_name(path)))
                    {
                        return true;
                    }
                }
                whole.as_ref().is_some_and(|g| g.is_match(path))
            }
            Strategy::RootAnchored { glob } => {
                if is_same_or_below(path, &self.pattern) {
                    return true;
                }
                glob.as_ref()
                    .is_some_and(|g| g.is_match(path) || any_ancestor(path, |a| g.is_match(a)))
            }
            Strategy::WildcardBasename { glob } => glob
                .as_ref()
                .is_some_and(|g| path.split('/').any(|segment| g.is_match(segment))),
            Strategy::Literal => path.split('/').any(|segment| segment == self.pattern),
        }
    }
}

/// Compile ignore-file lines into ordered rules, skipping blanks and comments.
#[must_use]
pub fn compile<I, S>(lines: I) -> Vec<IgnoreRule>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| IgnoreRule::compile(line.as_ref()))
        .collect()
}

/// Test one rule against a relative path.
#[must_use]
pub fn matches(rule: &IgnoreRule, path: &str, is_dir: bool) -> bool {
    rule.matches(path, is_dir)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn is_same_or_below(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Test every proper ancestor of `path`, e.g. `a` and `a/b` for `a/b/c`.
fn any_ancestor(path: &str, mut test: impl FnMut(&str) -> bool) -> bool {
    path.match_indices('/').any(|(i, _)| test(&path[..i]))
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `*` and `?` never cross `/`. Malformed globs compile to `None` and
/// therefore never match.
fn compile_glob(pattern: &str) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Ignoring malformed glob");
            None
        }
    }
}
