//! The remote API surface a batch job drives.

use async_trait::async_trait;
use bylaw_error::{GeminiError, GeminiErrorKind, GeminiResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reference to a document uploaded to the remote file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    uri: String,
}

impl FileHandle {
    /// Wrap a remote file URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Full URI as returned by the upload.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Final path segment of the URI, used to address the file for deletion.
    ///
    /// ```
    /// use bylaw_batch::FileHandle;
    ///
    /// let handle = FileHandle::new("https://example.test/v1beta/files/abc123");
    /// assert_eq!(handle.name().unwrap(), "abc123");
    /// assert!(FileHandle::new("abc123").name().is_err());
    /// ```
    pub fn name(&self) -> GeminiResult<&str> {
        let mut segments = self.uri.rsplit('/');
        match (segments.next(), segments.next()) {
            (Some(name), Some(_)) if !name.is_empty() => Ok(name),
            _ => Err(GeminiError::new(GeminiErrorKind::InvalidFileReference(
                self.uri.clone(),
            ))),
        }
    }
}

/// Calls a batch job makes against the extraction service.
///
/// Each method is a single call step: the runner wraps it in rate limiting
/// and retry, so implementations issue exactly one logical call and report
/// failures through [`GeminiError`], whose kind decides retryability.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Upload a local document and return a handle to the remote copy.
    async fn upload(&self, path: &Path) -> GeminiResult<FileHandle>;

    /// Count the tokens the model sees for the uploaded document.
    async fn count_tokens(&self, file: &FileHandle) -> GeminiResult<u64>;

    /// Run the extraction prompt against the uploaded document.
    ///
    /// `token_count` is the measured size of the document.
    async fn generate_content(
        &self,
        file: &FileHandle,
        token_count: u64,
    ) -> GeminiResult<serde_json::Value>;

    /// Remove the uploaded document from the remote store.
    async fn delete(&self, file: &FileHandle) -> GeminiResult<()>;
}
