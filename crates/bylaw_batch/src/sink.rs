//! Extraction result persistence.

use crate::ResultStatus;
use async_trait::async_trait;
use bylaw_error::{StorageError, StorageErrorKind};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Suffix of the file an invalid result is written to.
pub const ERROR_SUFFIX: &str = "-error.json";

/// Suffix of the file an invalid result is written to while reprocessing.
pub const REPROCESSED_ERROR_SUFFIX: &str = "-reprocessed-error.json";

/// Destination for extraction results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store the result extracted from `input` and return where it went.
    async fn persist(
        &self,
        input: &Path,
        result: &Value,
        status: ResultStatus,
    ) -> Result<PathBuf, StorageError>;
}

/// Writes each result as pretty-printed JSON into an output directory.
///
/// Valid results go to `<stem>.json` and invalid ones to `<stem>-error.json`.
/// In reprocessing mode invalid results go to `<stem>-reprocessed-error.json`
/// instead, and a valid result removes both error files of its document.
///
/// The output directory is created on first write. Files are written to a
/// temporary name and renamed into place, so a crash never leaves a truncated
/// result behind.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    output_dir: PathBuf,
    reprocessing: bool,
}

impl JsonFileSink {
    /// Create a sink rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            reprocessing: false,
        }
    }

    /// Route results as a rerun of previously failed documents.
    pub fn with_reprocessing(mut self, reprocessing: bool) -> Self {
        self.reprocessing = reprocessing;
        self
    }

    /// Directory results are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether this sink is rerunning failed documents.
    pub fn is_reprocessing(&self) -> bool {
        self.reprocessing
    }

    /// Output path for a given input document and result status.
    pub fn output_path(&self, input: &Path, status: ResultStatus) -> Result<PathBuf, StorageError> {
        let suffix = match status {
            ResultStatus::Valid => ".json",
            ResultStatus::Invalid if self.reprocessing => REPROCESSED_ERROR_SUFFIX,
            ResultStatus::Invalid => ERROR_SUFFIX,
        };
        self.named(input, suffix)
    }

    fn named(&self, input: &Path, suffix: &str) -> Result<PathBuf, StorageError> {
        let stem = input.file_stem().ok_or_else(|| {
            StorageError::new(StorageErrorKind::InvalidPath(input.display().to_string()))
        })?;
        let mut name = OsString::from(stem);
        name.push(suffix);
        Ok(self.output_dir.join(name))
    }

    /// Remove error files left by earlier runs. Failures are logged only.
    async fn clear_stale_errors(&self, input: &Path) -> Result<(), StorageError> {
        for suffix in [ERROR_SUFFIX, REPROCESSED_ERROR_SUFFIX] {
            let stale = self.named(input, suffix)?;
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => info!(path = %stale.display(), "Removed stale error file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %stale.display(), "Failed to remove stale error file: {}", e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    #[instrument(skip(self, input, result), fields(input = %input.display(), %status))]
    async fn persist(
        &self,
        input: &Path,
        result: &Value,
        status: ResultStatus,
    ) -> Result<PathBuf, StorageError> {
        let path = self.output_path(input, status)?;

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                self.output_dir.display(),
                e
            )))
        })?;

        let body = serde_json::to_string_pretty(result)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;

        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        tokio::fs::write(&temp_path, body).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        match status {
            ResultStatus::Valid => {
                info!(path = %path.display(), "Results saved");
                if self.reprocessing {
                    self.clear_stale_errors(input).await?;
                }
            }
            ResultStatus::Invalid => {
                warn!(path = %path.display(), "Invalid response saved to error file");
            }
        }
        Ok(path)
    }
}
