use crate::core::taxonomy::motif::{MotifLabel, MotifLabelError};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid label on row {row} of '{path}': {source}")]
    Label {
        path: String,
        row: usize,
        source: MotifLabelError,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    filepath: PathBuf,
    label: String,
}

/// One training or validation example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub label: MotifLabel,
}

/// Reads a `filepath,label` manifest. Extra columns are ignored.
///
/// Labels may use either the coarse class names or fine motif names
/// (`2x2`, `bulge3`, ...). Paths are returned as written.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let file = File::open(path).map_err(|e| ManifestError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_manifest_from(file, &path.to_string_lossy())
}

pub fn read_manifest_from(
    reader: impl Read,
    source_name: &str,
) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (index, result) in reader.deserialize::<ManifestRow>().enumerate() {
        let row = result.map_err(|e| ManifestError::Csv {
            path: source_name.to_string(),
            source: e,
        })?;
        let label = MotifLabel::parse_any(&row.label).map_err(|e| ManifestError::Label {
            path: source_name.to_string(),
            row: index + 1,
            source: e,
        })?;
        entries.push(ManifestEntry {
            path: row.filepath,
            label,
        });
    }
    Ok(entries)
}
