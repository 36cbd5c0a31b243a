//! Aggregation pipeline.
//!
//! This module provides:
//! - A shared [`BufferPool`] for file reads
//! - Concurrent reading of a frozen [`crate::tree::Selection`]
//! - The [`PromptDocument`] model with XML and JSON renderers

mod buffer_pool;
mod document;
mod generator;

pub use buffer_pool::{read_file_with_pool, BufferPool, PooledBuffer, ReadPath};
pub use document::{FileRecord, OutputFormat, PromptDocument};
pub use generator::{
    Aggregation, AggregationPipeline, FileFailure, PipelineStats, PipelineStatsSnapshot,
    NOISE_FILES,
};
