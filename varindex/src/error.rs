//! Error types for the package index.
//!
//! Most failure modes of the engine are deliberately *not* errors: damaged
//! packages are recorded with a damage reason, dangling dependencies are
//! tolerated, stale generations are detected by comparison and cancelled
//! requests resolve to [`Outcome::Cancelled`](crate::cancel::Outcome).
//! [`IndexError`] covers what remains.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while configuring, ingesting or refreshing the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A full rebuild is running; the incremental patch was rejected.
    #[error("a full rebuild is in progress; incremental refresh rejected")]
    RebuildInProgress,

    /// Failed to read the configuration file.
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The configuration file was readable but contained invalid values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a scan manifest.
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scan manifest could not be decoded.
    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to encode or write a scan manifest.
    #[error("failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A string could not be parsed as a metadata key.
    #[error("invalid package key: {0:?}")]
    InvalidKey(String),

    /// A string could not be parsed as a dependency reference.
    #[error("invalid dependency reference: {0:?}")]
    InvalidDependency(String),

    /// A background worker panicked or was aborted.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_in_progress_display() {
        let err = IndexError::RebuildInProgress;
        assert!(err.to_string().contains("rebuild is in progress"));
    }

    #[test]
    fn test_invalid_key_display_quotes_input() {
        let err = IndexError::InvalidKey("Alice..1".to_string());
        assert_eq!(err.to_string(), "invalid package key: \"Alice..1\"");
    }

    #[test]
    fn test_manifest_read_exposes_source() {
        use std::error::Error;

        let err = IndexError::ManifestRead {
            path: PathBuf::from("/tmp/missing.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/missing.json"));
    }
}
