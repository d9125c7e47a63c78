//! Input discovery and result persistence errors.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Input path does not exist
    #[display("Input path {} does not exist", _0)]
    InputNotFound(String),
    /// Input directory holds no PDF documents
    #[display("No PDF files found in {}", _0)]
    NoDocuments(String),
    /// Failed to list a directory
    #[display("Failed to read directory: {}", _0)]
    DirectoryRead(String),
    /// Failed to create output directory
    #[display("Failed to create output directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to read file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
    /// Failed to write file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Result could not be serialized or parsed
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Path has no usable file name
    #[display("Invalid path: {}", _0)]
    InvalidPath(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use bylaw_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NoDocuments("scans/".to_string()));
/// assert!(format!("{}", err).contains("No PDF files found in scans/"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }
}
