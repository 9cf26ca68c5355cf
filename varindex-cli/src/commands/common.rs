//! Configuration and index loading shared by all commands.

use std::path::{Path, PathBuf};

use varindex::manifest::load_manifest;
use varindex::{IndexConfig, MetadataKey, Outcome, PackageIndex};

use crate::error::CliError;

/// Directory under the home directory holding the CLI configuration.
pub const CONFIG_DIR_NAME: &str = ".varindex";

/// Configuration file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default configuration path: `~/.varindex/config.ini`.
pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Could not determine home directory; use --config".to_string()))
}

/// Load the configuration.
///
/// An explicit `--config` path must exist. The default path is optional and
/// falls back to built-in defaults when absent.
pub fn load_config(explicit: Option<&Path>) -> Result<IndexConfig, CliError> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(CliError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Ok(IndexConfig::load(path)?)
        }
        None => {
            let path = default_config_path()?;
            if path.is_file() {
                tracing::debug!(path = %path.display(), "Loading default configuration");
                Ok(IndexConfig::load(&path)?)
            } else {
                Ok(IndexConfig::default())
            }
        }
    }
}

/// Build an index from a configuration and a scan manifest.
pub fn open_index(config: IndexConfig, manifest: &Path) -> Result<PackageIndex, CliError> {
    let entries = load_manifest(manifest)?;
    let index = PackageIndex::new(config);
    match index.full_rescan(entries) {
        Outcome::Completed(_) => Ok(index),
        Outcome::Cancelled => Err(CliError::Cancelled),
    }
}

/// Parse a `Creator.Name.Version[#suffix]` argument.
pub fn parse_key(raw: &str) -> Result<MetadataKey, CliError> {
    raw.parse()
        .map_err(|_| CliError::InvalidArgument(format!("'{}' is not a package key", raw)))
}

/// Human-readable byte size.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = TempDir::new().unwrap();
        let result = load_config(Some(&dir.path().join("nope.ini")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_explicit_config_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[filter]\npartition_size = 8\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.filter_partition_size, 8);
    }

    #[test]
    fn test_parse_key_rejects_garbage() {
        assert!(parse_key("Alice.Outfit.1").is_ok());
        assert!(matches!(parse_key("nonsense"), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
