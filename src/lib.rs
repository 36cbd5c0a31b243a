//! ctxpack
//!
//! Select files from a directory tree and pack them into one prompt document
//! for a language model.
//!
//! The flow is scan, select, aggregate:
//! - [`scanner`] walks a root with extension, name and ignore filters
//! - [`tree`] arranges entries for lazy expansion and selection
//! - [`pipeline`] reads the selection concurrently and renders XML or JSON

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod preferences;
pub mod scanner;
pub mod tokens;
pub mod tree;

pub use config::{Config, FilterConfig};
pub use error::{AggregateError, Error, Result, ScanError};
pub use matcher::IgnoreMatcher;
pub use pipeline::{AggregationPipeline, BufferPool, OutputFormat, PromptDocument};
pub use scanner::{scan_directory, DirectoryScanner, Entry};
pub use tree::{FileTree, Selection};
