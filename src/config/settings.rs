//! Configuration settings and validation.

use std::path::PathBuf;

use super::FilterConfig;
use crate::pipeline::OutputFormat;
use crate::{Error, Result};

/// Size of each pooled read buffer. Files up to this size reuse pooled memory.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default model context limit used for the token warning.
pub const DEFAULT_TOKEN_LIMIT: usize = 8192;

const MAX_WORKERS: usize = 256;

/// Worker count that overlaps I/O wait: twice the available parallelism.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
        .min(MAX_WORKERS)
}

/// Main configuration for a ctxpack run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory to scan.
    pub root: PathBuf,

    /// Scan filters.
    pub filters: FilterConfig,

    /// Free-text instructions placed in the output document.
    pub instructions: String,

    /// Output document format.
    pub format: OutputFormat,

    /// Number of aggregation worker threads.
    pub workers: usize,

    /// Pooled read buffer size in bytes.
    pub buffer_size: usize,

    /// Model token limit used for warnings.
    pub token_limit: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            filters: FilterConfig::default(),
            instructions: String::new(),
            format: OutputFormat::Xml,
            workers: default_workers(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            token_limit: DEFAULT_TOKEN_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("root directory cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.workers == 0 {
            return Err(Error::config("workers cannot be 0"));
        }

        if self.workers > MAX_WORKERS {
            return Err(Error::config(format!(
                "workers cannot exceed {MAX_WORKERS}"
            )));
        }

        if self.buffer_size == 0 {
            return Err(Error::config("buffer_size cannot be 0"));
        }

        if self.token_limit == 0 {
            return Err(Error::config("token_limit cannot be 0"));
        }

        if let Some(sub) = &self.filters.sub_path {
            if sub.is_absolute() {
                return Err(Error::config(format!(
                    "sub_path must be relative to the root, got {}",
                    sub.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.token_limit, 8192);
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validate_too_many_workers() {
        let config = Config {
            workers: 1000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_empty_root() {
        let config = Config {
            root: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_absolute_sub_path() {
        let config = Config {
            filters: FilterConfig::new().with_sub_path("/etc"),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sub_path"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }
}
