//! Input document discovery.

use crate::sink::{ERROR_SUFFIX, REPROCESSED_ERROR_SUFFIX};
use bylaw_error::{StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Resolve the documents a batch processes.
///
/// A file path yields itself. A directory yields every `*.pdf` file directly
/// inside it (extension matched case-insensitively), sorted by path so jobs
/// run in a stable order.
///
/// # Errors
///
/// Fails when the path does not exist, cannot be listed, or is a directory
/// without any PDF files.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>, StorageError> {
    if path.is_file() {
        debug!("Single input file");
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(StorageError::new(StorageErrorKind::InputNotFound(
            path.display().to_string(),
        )));
    }

    let entries = std::fs::read_dir(path).map_err(|e| {
        StorageError::new(StorageErrorKind::DirectoryRead(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;

    let mut inputs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        let candidate = entry.path();
        if candidate.is_file() && is_pdf(&candidate) {
            inputs.push(candidate);
        }
    }

    if inputs.is_empty() {
        return Err(StorageError::new(StorageErrorKind::NoDocuments(
            path.display().to_string(),
        )));
    }

    inputs.sort();
    info!("Found {} PDF files to process", inputs.len());
    Ok(inputs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Resolve the documents whose earlier results were saved as error files.
///
/// Every `<stem>-error.json` in `output_dir` maps back to `<stem>.pdf` in the
/// input directory. Files written while reprocessing are not picked up again.
/// Error files without a matching PDF are logged and skipped. When `input` is
/// a single file it is returned only if it has an error file.
///
/// A missing output directory yields no documents.
#[instrument(skip(input, output_dir), fields(input = %input.display(), output = %output_dir.display()))]
pub fn collect_errored_inputs(
    input: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, StorageError> {
    if !output_dir.is_dir() {
        info!("No output directory yet, nothing to reprocess");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(output_dir).map_err(|e| {
        StorageError::new(StorageErrorKind::DirectoryRead(format!(
            "{}: {}",
            output_dir.display(),
            e
        )))
    })?;

    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryRead(format!(
                "{}: {}",
                output_dir.display(),
                e
            )))
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(REPROCESSED_ERROR_SUFFIX) {
            continue;
        }
        if let Some(stem) = name.strip_suffix(ERROR_SUFFIX) {
            stems.push(stem.to_string());
        }
    }

    let mut inputs = Vec::new();
    if input.is_file() {
        let matches = input
            .file_stem()
            .is_some_and(|stem| stems.iter().any(|s| stem == s.as_str()));
        if matches {
            inputs.push(input.to_path_buf());
        }
    } else {
        for stem in stems {
            let candidate = input.join(format!("{}.pdf", stem));
            if candidate.is_file() {
                inputs.push(candidate);
            } else {
                warn!("Original PDF not found for error file: {}", candidate.display());
            }
        }
    }

    inputs.sort();
    info!("Found {} errored files to reprocess", inputs.len());
    Ok(inputs)
}
