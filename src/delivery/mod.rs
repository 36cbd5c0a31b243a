//! Delivery of the rendered prompt.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Destination for a rendered prompt.
pub trait DeliverySink: Send + Sync {
    /// Deliver the full prompt text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be delivered.
    fn deliver(&self, text: &str) -> Result<()>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Writes the prompt to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl DeliverySink for StdoutSink {
    fn deliver(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .and_then(|()| {
                if text.ends_with('\n') {
                    Ok(())
                } else {
                    stdout.write_all(b"\n")
                }
            })
            .and_then(|()| stdout.flush())
            .map_err(|e| Error::Delivery(format!("failed to write to stdout: {e}")))
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

/// Writes the prompt to a file, replacing any previous content.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Create a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeliverySink for FileSink {
    fn deliver(&self, text: &str) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                Error::Delivery(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        fs::write(&self.path, text).map_err(|e| {
            Error::Delivery(format!("failed to write {}: {e}", self.path.display()))
        })?;
        tracing::info!(path = %self.path.display(), bytes = text.len(), "Prompt written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a sink: a file when `output` is given, stdout otherwise.
#[must_use]
pub fn sink_for(output: Option<&Path>) -> Box<dyn DeliverySink> {
    match output {
        Some(path) => Box::new(FileSink::new(path)),
        None => Box::new(StdoutSink),
    }
}
