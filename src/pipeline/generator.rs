//! Concurrent file aggregation.
//!
//! Selected files are fanned out to a bounded set of named worker threads.
//! Each worker reads one file at a time through the shared [`BufferPool`]
//! and sends a record or a failure back to the collector. The collector
//! sorts records by path before building the document.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ScopedJoinHandle;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tokio_util::sync::CancellationToken;

use super::buffer_pool::{read_file_with_pool, BufferPool, ReadPath};
use super::document::{FileRecord, PromptDocument};
use crate::config::Config;
use crate::error::AggregateError;
use crate::matcher::{to_slash, IgnoreMatcher};
use crate::scanner::extension_of;
use crate::tree::{SelectedFile, Selection};
use crate::{Error, Result};

/// OS metadata files that never belong in a prompt.
pub const NOISE_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

const PROGRESS_INTERVAL: usize = 500;

/// Pipeline statistics.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub files_read: AtomicU64,
    pub files_skipped: AtomicU64,
    pub files_failed: AtomicU64,
    pub files_abandoned: AtomicU64,
    pub pooled_reads: AtomicU64,
    pub oversized_reads: AtomicU64,
    pub bytes_read: AtomicU64,
}

impl PipelineStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            files_read: self.files_read.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_abandoned: self.files_abandoned.load(Ordering::Relaxed),
            pooled_reads: self.pooled_reads.load(Ordering::Relaxed),
            oversized_reads: self.oversized_reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub files_read: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub files_abandoned: u64,
    pub pooled_reads: u64,
    pub oversized_reads: u64,
    pub bytes_read: u64,
}

/// A file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read file {}: {}", self.path.display(), self.reason)
    }
}

/// Result of one pipeline run.
///
/// Read failures do not discard the files that were read: the document is
/// always present and [`Aggregation::error`] reports what went missing.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub document: PromptDocument,
    pub failures: Vec<FileFailure>,
    /// Number of files dispatched to workers.
    pub total: usize,
    pub stats: PipelineStatsSnapshot,
}

impl Aggregation {
    /// True if every dispatched file was read or deliberately skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Summary error naming the failure count and the last failure seen.
    #[must_use]
    pub fn error(&self) -> Option<AggregateError> {
        let last = self.failures.last()?;
        Some(AggregateError::FilesFailed {
            failed: self.failures.len(),
            total: self.total,
            last: last.to_string(),
        })
    }

    /// Split into the document and the partial-failure error, if any.
    #[must_use]
    pub fn into_parts(self) -> (PromptDocument, Option<Error>) {
        let error = self.error().map(Error::from);
        (self.document, error)
    }

    /// The document, or an error if any file failed.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::FilesFailed`] if any file could not be read.
    pub fn into_result(self) -> Result<PromptDocument> {
        match self.into_parts() {
            (document, None) => Ok(document),
            (_, Some(e)) => Err(e),
        }
    }
}

enum Outcome {
    Record(FileRecord),
    Failed(FileFailure),
}

#[derive(Clone, Copy)]
struct WorkerContext<'a> {
    base_dir: &'a Path,
    pool: &'a BufferPool,
    ignore: Option<&'a IgnoreMatcher>,
    cancel: &'a CancellationToken,
    stats: &'a PipelineStats,
}

/// Reads selected files concurrently and assembles a [`PromptDocument`].
#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    pool: Arc<BufferPool>,
    workers: usize,
    cancel: CancellationToken,
    ignore_file: bool,
}

impl AggregationPipeline {
    /// Create a pipeline with `workers` threads sharing `pool`.
    #[must_use]
    pub fn new(pool: Arc<BufferPool>, workers: usize) -> Self {
        Self {
            pool,
            workers: workers.max(1),
            cancel: CancellationToken::new(),
            ignore_file: true,
        }
    }

    /// Create a pipeline and its buffer pool from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let pool = BufferPool::with_max_idle(config.buffer_size, config.workers);
        Self::new(Arc::new(pool), config.workers)
            .with_ignore_file(config.filters.respect_ignore_file)
    }

    /// Whether the root `.gitignore` is re-applied to the selection.
    ///
    /// Should match the filters the selection was scanned with.
    #[must_use]
    pub const fn with_ignore_file(mut self, respect: bool) -> Self {
        self.ignore_file = respect;
        self
    }

    /// Use `token` to stop runs early.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs of this pipeline.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Worker thread count.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Shared buffer pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Read every selected file and build the prompt document.
    ///
    /// Relative selection paths are resolved against `base_dir`, and record
    /// paths are reported relative to it. Directories in the selection are
    /// skipped. Unless disabled with [`Self::with_ignore_file`], a
    /// `.gitignore` at `base_dir` is applied as a safety filter.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Cancelled`] if the run was cancelled, or
    /// [`AggregateError::WorkerPool`] if a worker could not be started or
    /// panicked. Per-file read failures are reported through
    /// [`Aggregation::error`] instead.
    pub fn generate(
        &self,
        selection: &Selection,
        instructions: &str,
        base_dir: &Path,
    ) -> Result<Aggregation> {
        let start = Instant::now();
        let stats = PipelineStats::new();
        let files: Vec<&SelectedFile> = selection.files().iter().filter(|f| !f.is_dir).collect();
        let total = files.len();

        if self.cancel.is_cancelled() {
            return Err(AggregateError::Cancelled {
                completed: 0,
                abandoned: total,
            }
            .into());
        }

        if total == 0 {
            tracing::debug!("Empty selection, producing empty document");
            return Ok(Aggregation {
                document: PromptDocument::new(instructions),
                failures: Vec::new(),
                total,
                stats: stats.snapshot(),
            });
        }

        let ignore = if self.ignore_file {
            load_ignore(base_dir)
        } else {
            None
        };
        let ctx = WorkerContext {
            base_dir,
            pool: &self.pool,
            ignore: ignore.as_ref(),
            cancel: &self.cancel,
            stats: &stats,
        };
        let worker_count = self.workers.min(total);

        tracing::debug!(files = total, workers = worker_count, "Starting aggregation");
        let (records, failures) = run_workers(ctx, &files, worker_count)?;

        if self.cancel.is_cancelled() {
            let completed = records.len() + failures.len();
            let abandoned = stats.files_abandoned.load(Ordering::Relaxed);
            tracing::info!(completed, abandoned, total, "Aggregation cancelled");
            return Err(AggregateError::Cancelled {
                completed,
                abandoned: usize::try_from(abandoned).unwrap_or(usize::MAX),
            }
            .into());
        }

        let mut document = PromptDocument::new(instructions);
        document.files = records;
        document.sort_files();

        let snapshot = stats.snapshot();
        tracing::info!(
            files = document.files.len(),
            failed = failures.len(),
            skipped = snapshot.files_skipped,
            bytes = snapshot.bytes_read,
            elapsed_ms = start.elapsed().as_millis(),
            "Aggregation complete"
        );

        Ok(Aggregation {
            document,
            failures,
            total,
            stats: snapshot,
        })
    }

    /// Async version of [`Self::generate`] on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Same as [`Self::generate`], or an internal error if the task fails.
    pub async fn generate_async(
        &self,
        selection: Selection,
        instructions: String,
        base_dir: PathBuf,
    ) -> Result<Aggregation> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || {
            pipeline.generate(&selection, &instructions, &base_dir)
        })
        .await
        .map_err(|e| Error::internal(format!("Aggregation task failed: {e}")))?
    }
}

fn load_ignore(base_dir: &Path) -> Option<IgnoreMatcher> {
    match IgnoreMatcher::from_root(base_dir) {
        Ok(matcher) => matcher,
        Err(e) => {
            tracing::warn!(
                path = %base_dir.display(),
                error = %e,
                "Failed to read ignore file, aggregating without it"
            );
            None
        }
    }
}

fn run_workers(
    ctx: WorkerContext<'_>,
    files: &[&SelectedFile],
    worker_count: usize,
) -> Result<(Vec<FileRecord>, Vec<FileFailure>)> {
    std::thread::scope(|scope| -> Result<_> {
        let (work_tx, work_rx) = bounded::<&SelectedFile>(worker_count * 4);
        let (result_tx, result_rx) = unbounded::<Outcome>();
        let mut handles = Vec::with_capacity(worker_count);

        for i in 0..worker_count {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("aggregate-worker-{i}"))
                .spawn_scoped(scope, move || worker_loop(ctx, &work_rx, &result_tx))
                .map_err(|e| AggregateError::WorkerPool(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }
        drop(work_rx);
        drop(result_tx);

        let mut sent = 0;
        for &file in files {
            if ctx.cancel.is_cancelled() || work_tx.send(file).is_err() {
                break;
            }
            sent += 1;
        }
        drop(work_tx);
        ctx.stats
            .files_abandoned
            .fetch_add((files.len() - sent) as u64, Ordering::Relaxed);

        let mut records = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        for outcome in &result_rx {
            match outcome {
                Outcome::Record(record) => {
                    records.push(record);
                    if records.len() % PROGRESS_INTERVAL == 0 {
                        tracing::debug!(
                            processed = records.len(),
                            total = files.len(),
                            "Aggregation progress"
                        );
                    }
                }
                Outcome::Failed(failure) => failures.push(failure),
            }
        }

        join_workers(handles)?;
        Ok((records, failures))
    })
}

/// Join every handle before reporting panics.
fn join_workers<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Result<()> {
    let panicked = handles
        .into_iter()
        .map(ScopedJoinHandle::join)
        .filter(std::result::Result::is_err)
        .count();
    if panicked > 0 {
        return Err(AggregateError::WorkerPool(format!("{panicked} worker(s) panicked")).into());
    }
    Ok(())
}

fn worker_loop(ctx: WorkerContext<'_>, work_rx: &Receiver<&SelectedFile>, result_tx: &Sender<Outcome>) {
    for file in work_rx {
        if ctx.cancel.is_cancelled() {
            ctx.stats.files_abandoned.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if let Some(outcome) = process_file(ctx, file) {
            if result_tx.send(outcome).is_err() {
                return;
            }
        }
    }
    tracing::trace!("Aggregation worker done");
}

fn process_file(ctx: WorkerContext<'_>, file: &SelectedFile) -> Option<Outcome> {
    let path = if file.path.is_absolute() {
        file.path.clone()
    } else {
        ctx.base_dir.join(&file.path)
    };
    let relative = path.strip_prefix(ctx.base_dir).ok().map(to_slash);

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if NOISE_FILES.contains(&name) {
        ctx.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
        return None;
    }

    if let (Some(matcher), Some(rel)) = (ctx.ignore, relative.as_deref()) {
        if matcher.is_excluded(rel, false) {
            tracing::trace!(path = rel, "Skipping ignored file");
            ctx.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
    }

    match read_file_with_pool(&path, ctx.pool) {
        Ok((content, how)) => {
            let counter = match how {
                ReadPath::Pooled => &ctx.stats.pooled_reads,
                ReadPath::Oversized => &ctx.stats.oversized_reads,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            ctx.stats.files_read.fetch_add(1, Ordering::Relaxed);
            ctx.stats
                .bytes_read
                .fetch_add(content.len() as u64, Ordering::Relaxed);

            Some(Outcome::Record(FileRecord {
                path: relative.unwrap_or_else(|| path.display().to_string()),
                file_type: extension_of(&path),
                content,
            }))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read file");
            ctx.stats.files_failed.fetch_add(1, Ordering::Relaxed);
            Some(Outcome::Failed(FileFailure {
                path,
                reason: e.to_string(),
            }))
        }
    }
}
