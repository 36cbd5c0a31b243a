//! Structured logging configuration.
//!
//! Logs are written to stderr so stdout can carry the generated prompt.
//! The level comes from `RUST_LOG` when set, otherwise from the CLI or
//! `CTXPACK_LOG_LEVEL`.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Environment variable holding the default log level.
pub const LOG_LEVEL_ENV: &str = "CTXPACK_LOG_LEVEL";

/// Environment variable enabling JSON log output.
pub const LOG_JSON_ENV: &str = "CTXPACK_LOG_JSON";

/// Tracing configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Initialize tracing for the process.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };
    result.map_err(|e| Error::internal(format!("failed to initialize tracing: {e}")))?;

    tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    Ok(())
}

/// Read tracing configuration from `CTXPACK_LOG_LEVEL` and `CTXPACK_LOG_JSON`.
#[must_use]
pub fn config_from_env() -> TracingConfig {
    config_from_vars(
        std::env::var(LOG_LEVEL_ENV).ok(),
        std::env::var(LOG_JSON_ENV).ok(),
    )
}

fn config_from_vars(level: Option<String>, json: Option<String>) -> TracingConfig {
    TracingConfig {
        level: level.unwrap_or_else(|| "info".to_string()),
        json: json.is_some_and(|v| is_truthy(&v)),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Span helpers for the two long-running phases.
pub mod spans {
    use std::path::Path;

    use tracing::{info_span, Span};

    /// Span covering a directory scan.
    #[must_use]
    pub fn scan_span(root: &Path) -> Span {
        info_span!("scan", root = %root.display())
    }

    /// Span covering one aggregation run.
    #[must_use]
    pub fn aggregate_span(files: usize, workers: usize) -> Span {
        info_span!("aggregate", files, workers)
    }
}
