//! JSON scan manifests.
//!
//! A manifest is a JSON array of [`ScanEntry`] values, as produced by an
//! external package parser. It is the input format of a full rescan when the
//! index is driven from the command line.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::package::ScanEntry;

/// Read and decode a manifest file.
pub fn load_manifest(path: &Path) -> IndexResult<Vec<ScanEntry>> {
    let contents = fs::read_to_string(path).map_err(|source| IndexError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: Vec<ScanEntry> =
        serde_json::from_str(&contents).map_err(|source| IndexError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), entries = entries.len(), "Loaded scan manifest");
    Ok(entries)
}

/// Encode entries as a pretty-printed manifest.
pub fn write_manifest(path: &Path, entries: &[ScanEntry]) -> IndexResult<()> {
    let write_error = |source: std::io::Error| IndexError::ManifestWrite {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(entries).map_err(|e| write_error(e.into()))?;
    fs::write(path, json).map_err(write_error)?;

    debug!(path = %path.display(), entries = entries.len(), "Wrote scan manifest");
    Ok(())
}
