//! Source document URLs loaded from a CSV manifest.

use bylaw_error::{StorageError, StorageErrorKind};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument};

/// Field added to valid results that have a known source URL.
pub const URL_FIELD: &str = "urlOriginalDocument";

/// Maps PDF file names to the URL each document was downloaded from.
///
/// The manifest is a CSV of `file name,url` rows. A leading
/// `file name,url` header row is skipped, matched case-insensitively.
/// Rows with fewer than two columns are ignored and extra columns are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlMap {
    urls: HashMap<String, String>,
}

impl UrlMap {
    /// Load a manifest from disk.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or is not readable CSV.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn from_csv(path: &Path) -> Result<Self, StorageError> {
        if !path.is_file() {
            return Err(StorageError::new(StorageErrorKind::InputNotFound(
                path.display().to_string(),
            )));
        }

        let records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?
            .into_records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                StorageError::new(StorageErrorKind::Serialization(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;

        let mut urls = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            let (Some(name), Some(url)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if index == 0 && is_header(name, url) {
                continue;
            }
            urls.insert(name.trim().to_string(), url.trim().to_string());
        }

        info!("Loaded {} URL mappings from CSV", urls.len());
        Ok(Self { urls })
    }

    /// URL for a PDF file name.
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.urls.get(file_name).map(String::as_str)
    }

    /// Number of mapped documents.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// True when no documents are mapped.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl FromIterator<(String, String)> for UrlMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            urls: iter.into_iter().collect(),
        }
    }
}

fn is_header(name: &str, url: &str) -> bool {
    name.trim().eq_ignore_ascii_case("file name") && url.trim().eq_ignore_ascii_case("url")
}
