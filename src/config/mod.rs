//! Configuration management for ctxpack.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Saved preferences (lowest priority)

mod filters;
mod settings;

pub use filters::{parse_extensions, parse_patterns, FilterConfig};
pub use settings::{default_workers, Config, DEFAULT_BUFFER_SIZE, DEFAULT_TOKEN_LIMIT};
