//! Directory scanning.
//!
//! This module provides:
//! - [`Entry`], one scanned file or directory
//! - [`DirectoryScanner`], a single-pass walk that prunes ignored subtrees

mod directory;
mod entry;

pub use directory::{
    scan_directory, scan_directory_async, DirectoryScanner, ScanStats, ScanStatsSnapshot,
};
pub use entry::{extension_of, Entry};
