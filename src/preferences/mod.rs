//! Persisted user preferences.
//!
//! The last scanned directory and the last filter strings are stored as a
//! small JSON document:
//!
//! ```json
//! { "lastDirectory": "/home/me/project", "filters": { "extensions": ".rs,.toml" } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{parse_extensions, parse_patterns, FilterConfig};
use crate::{Error, Result};

/// Directory under the home directory holding the preferences file.
pub const PREFERENCES_DIR: &str = ".ctxpack";

/// Preferences file name.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Filter key for the comma-separated extension list.
pub const FILTER_EXTENSIONS: &str = "extensions";
/// Filter key for the file name glob.
pub const FILTER_NAME: &str = "name";
/// Filter key for the comma-separated ignore globs.
pub const FILTER_IGNORE: &str = "ignore";
/// Filter key for whether `.gitignore` is honoured (`true`/`false`).
pub const FILTER_IGNORE_FILE: &str = "gitignore";

/// Stored preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(rename = "lastDirectory")]
    pub last_directory: String,
    pub filters: BTreeMap<String, String>,
}

impl Preferences {
    /// Last scanned directory, if one was recorded.
    #[must_use]
    pub fn last_directory(&self) -> Option<PathBuf> {
        (!self.last_directory.is_empty()).then(|| PathBuf::from(&self.last_directory))
    }

    /// Record the last scanned directory.
    pub fn set_last_directory(&mut self, dir: &Path) {
        self.last_directory = dir.display().to_string();
    }

    /// Stored value for a filter key.
    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(String::as_str)
    }

    /// Store a filter value. Empty values remove the key.
    pub fn set_filter(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.filters.remove(name);
        } else {
            self.filters.insert(name.to_string(), value);
        }
    }

    /// Build scan filters from the stored filter strings.
    #[must_use]
    pub fn filter_config(&self) -> FilterConfig {
        let mut filters = FilterConfig::new();
        if let Some(exts) = self.filter(FILTER_EXTENSIONS) {
            filters = filters.with_extensions(parse_extensions(exts));
        }
        if let Some(name) = self.filter(FILTER_NAME) {
            filters = filters.with_name_pattern(name);
        }
        if let Some(ignore) = self.filter(FILTER_IGNORE) {
            filters = filters.with_ignore_patterns(parse_patterns(ignore));
        }
        if let Some(flag) = self.filter(FILTER_IGNORE_FILE) {
            filters = filters.with_ignore_file(!matches!(flag, "false" | "0" | "no"));
        }
        filters
    }

    /// Store the user-facing parts of `filters`.
    pub fn remember_filters(&mut self, filters: &FilterConfig) {
        let extensions: Vec<String> = filters.extensions.iter().map(|e| format!(".{e}")).collect();
        self.set_filter(FILTER_EXTENSIONS, extensions.join(","));
        self.set_filter(FILTER_NAME, filters.name_pattern.clone().unwrap_or_default());
        self.set_filter(FILTER_IGNORE, filters.ignore_patterns.join(","));
        self.set_filter(FILTER_IGNORE_FILE, filters.respect_ignore_file.to_string());
    }
}

/// Storage for [`Preferences`].
pub trait PreferenceStore: Send + Sync {
    /// Load preferences. A store with nothing saved yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if stored preferences exist but cannot be read.
    fn load(&self) -> Result<Preferences>;

    /// Persist preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be written.
    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// Preferences stored as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    /// Store at `~/.ctxpack/preferences.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Preferences("cannot determine home directory".to_string()))?;
        Ok(Self::at(home.join(PREFERENCES_DIR).join(PREFERENCES_FILE)))
    }

    /// Store at an explicit file path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the preferences file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let data = fs::read_to_string(&self.path).map_err(|e| {
            Error::Preferences(format!("failed to read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            Error::Preferences(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                Error::Preferences(format!("failed to create {}: {e}", dir.display()))
            })?;
        }

        let data = serde_json::to_string_pretty(preferences)
            .map_err(|e| Error::Preferences(format!("failed to serialize: {e}")))?;
        fs::write(&self.path, data).map_err(|e| {
            Error::Preferences(format!("failed to write {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = JsonPreferenceStore::at(tmp.path().join("none.json"));
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_save_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let store = JsonPreferenceStore::at(tmp.path().join(".ctxpack/preferences.json"));

        let mut prefs = Preferences::default();
        prefs.set_last_directory(Path::new("/work/project"));
        prefs.set_filter(FILTER_EXTENSIONS, ".rs,.toml");
        store.save(&prefs).unwrap();

        assert_eq!(store.load().unwrap(), prefs);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"lastDirectory\": \"/work/project\""));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.json");
        fs::write(&path, r#"{"lastDirectory":"/a"}"#).unwrap();
        let prefs = JsonPreferenceStore::at(&path).load().unwrap();
        assert_eq!(prefs.last_directory(), Some(PathBuf::from("/a")));
        assert!(prefs.filters.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonPreferenceStore::at(&path).load().unwrap_err();
        assert!(matches!(err, Error::Preferences(_)));
    }

    #[test]
    fn test_filter_config_from_strings() {
        let mut prefs = Preferences::default();
        prefs.set_filter(FILTER_EXTENSIONS, ".rs, go");
        prefs.set_filter(FILTER_NAME, "*_test*");
        prefs.set_filter(FILTER_IGNORE, "target,*.lock");
        prefs.set_filter(FILTER_IGNORE_FILE, "false");

        let filters = prefs.filter_config();
        assert!(filters.allows_extension("rs"));
        assert!(filters.allows_extension("go"));
        assert!(!filters.allows_extension("py"));
        assert_eq!(filters.name_pattern.as_deref(), Some("*_test*"));
        assert_eq!(filters.ignore_patterns, vec!["target", "*.lock"]);
        assert!(!filters.respect_ignore_file);
    }

    #[test]
    fn test_remember_filters_round_trip() {
        let filters = FilterConfig::new()
            .with_extensions(["rs"])
            .with_ignore_patterns(["target"])
            .with_ignore_file(true);
        let mut prefs = Preferences::default();
        prefs.remember_filters(&filters);

        assert_eq!(prefs.filter(FILTER_EXTENSIONS), Some(".rs"));
        assert_eq!(prefs.filter(FILTER_NAME), None);
        let restored = prefs.filter_config();
        assert_eq!(restored.extensions, filters.extensions);
        assert_eq!(restored.ignore_patterns, filters.ignore_patterns);
        assert!(restored.respect_ignore_file);
    }

    #[test]
    fn test_empty_last_directory() {
        assert_eq!(Preferences::default().last_directory(), None);
    }
}
