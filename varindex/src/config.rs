//! Index configuration.
//!
//! [`IndexConfig`] gathers the scan roots, external destinations and tuning
//! knobs of the engine. It can be built in code with the `with_*` methods or
//! loaded from an INI file:
//!
//! ```ini
//! [index]
//! package_extension = var
//! ingest_batch_size = 1024
//!
//! [rescan]
//! max_change_ratio = 0.25
//! max_changed_files = 2000
//!
//! [filter]
//! partition_size = 512
//!
//! [root.addons]
//! path = /games/vam/AddonPackages
//! status = installed
//!
//! [destination.nas]
//! path = /mnt/nas/vam
//! enabled = true
//! show_in_main_table = false
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};

use crate::error::{IndexError, IndexResult};
use crate::package::PackageStatus;
use crate::scanner::{ScanThresholds, DEFAULT_MAX_CHANGED_FILES, DEFAULT_MAX_CHANGE_RATIO};

/// Default package file extension.
pub const DEFAULT_PACKAGE_EXTENSION: &str = "var";

/// Default number of entries converted between cancellation checks during
/// ingest.
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 1024;

/// Default number of records per parallel filter partition.
///
/// Cancellation is checked between partitions, so this also bounds how much
/// work a superseded filter request can still do.
pub const DEFAULT_FILTER_PARTITION_SIZE: usize = 512;

/// A directory scanned for packages, with the status its packages get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub status: PackageStatus,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>, status: PackageStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// An external location hosting packages outside the main library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalDestination {
    /// Display name, also stored on every record found there.
    pub name: String,

    pub path: PathBuf,

    /// Disabled destinations are neither listed nor ingested.
    pub enabled: bool,

    /// Whether packages at this destination appear in filtered views.
    pub show_in_main_table: bool,
}

impl ExternalDestination {
    /// Create an enabled, visible destination.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            enabled: true,
            show_in_main_table: true,
        }
    }

    /// Set the main-table visibility (builder pattern).
    pub fn with_show_in_main_table(mut self, show: bool) -> Self {
        self.show_in_main_table = show;
        self
    }

    /// Set the enabled state (builder pattern).
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A destination is usable when enabled, named, and its path is an
    /// existing directory.
    pub fn is_valid(&self) -> bool {
        self.enabled && !self.name.trim().is_empty() && self.path.is_dir()
    }
}

/// Configuration of a [`PackageIndex`](crate::index::PackageIndex).
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub roots: Vec<ScanRoot>,
    pub destinations: Vec<ExternalDestination>,

    /// Package file extension, without the dot.
    pub package_extension: String,

    pub thresholds: ScanThresholds,
    pub ingest_batch_size: usize,
    pub filter_partition_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            destinations: Vec::new(),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            thresholds: ScanThresholds::default(),
            ingest_batch_size: DEFAULT_INGEST_BATCH_SIZE,
            filter_partition_size: DEFAULT_FILTER_PARTITION_SIZE,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scan root.
    pub fn with_root(mut self, path: impl Into<PathBuf>, status: PackageStatus) -> Self {
        self.roots.push(ScanRoot::new(path, status));
        self
    }

    /// Add an external destination.
    pub fn with_destination(mut self, destination: ExternalDestination) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ScanThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_filter_partition_size(mut self, size: usize) -> Self {
        self.filter_partition_size = size.max(1);
        self
    }

    pub fn with_ingest_batch_size(mut self, size: usize) -> Self {
        self.ingest_batch_size = size.max(1);
        self
    }

    /// Load configuration from an INI file.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|source| IndexError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Build configuration from parsed INI contents.
    ///
    /// Missing keys keep their defaults. Roots and destinations are read
    /// from `[root.<name>]` and `[destination.<name>]` sections.
    pub fn from_ini(ini: &Ini) -> IndexResult<Self> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("index")) {
            if let Some(ext) = section.get("package_extension") {
                let ext = ext.trim().trim_start_matches('.');
                if ext.is_empty() {
                    return Err(IndexError::InvalidConfig(
                        "index.package_extension must not be empty".to_string(),
                    ));
                }
                config.package_extension = ext.to_string();
            }
            config.ingest_batch_size =
                parse_value(section, "index", "ingest_batch_size", DEFAULT_INGEST_BATCH_SIZE)?
                    .max(1);
        }

        if let Some(section) = ini.section(Some("rescan")) {
            let max_change_ratio =
                parse_value(section, "rescan", "max_change_ratio", DEFAULT_MAX_CHANGE_RATIO)?;
            if !(0.0..=1.0).contains(&max_change_ratio) {
                return Err(IndexError::InvalidConfig(format!(
                    "rescan.max_change_ratio must be between 0 and 1, got {}",
                    max_change_ratio
                )));
            }
            config.thresholds = ScanThresholds {
                max_change_ratio,
                max_changed_files: parse_value(
                    section,
                    "rescan",
                    "max_changed_files",
                    DEFAULT_MAX_CHANGED_FILES,
                )?,
            };
        }

        if let Some(section) = ini.section(Some("filter")) {
            config.filter_partition_size =
                parse_value(section, "filter", "partition_size", DEFAULT_FILTER_PARTITION_SIZE)?
                    .max(1);
        }

        for (name, section) in ini.iter() {
            let Some(name) = name else { continue };

            if let Some(root_name) = name.strip_prefix("root.") {
                let path = required(section, name, "path")?;
                let status = match section.get("status") {
                    Some(status) => status.parse::<PackageStatus>()?,
                    None => PackageStatus::Installed,
                };
                if status == PackageStatus::External {
                    return Err(IndexError::InvalidConfig(format!(
                        "root '{}' cannot have status external; declare a destination instead",
                        root_name
                    )));
                }
                config.roots.push(ScanRoot::new(path, status));
            } else if let Some(dest_name) = name.strip_prefix("destination.") {
                let path = required(section, name, "path")?;
                config.destinations.push(ExternalDestination {
                    name: dest_name.to_string(),
                    path: PathBuf::from(path),
                    enabled: parse_value(section, name, "enabled", true)?,
                    show_in_main_table: parse_value(section, name, "show_in_main_table", true)?,
                });
            }
        }

        Ok(config)
    }
}

fn required<'a>(section: &'a Properties, name: &str, key: &str) -> IndexResult<&'a str> {
    section
        .get(key)
        .ok_or_else(|| IndexError::InvalidConfig(format!("[{}] is missing '{}'", name, key)))
}

fn parse_value<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    default: T,
) -> IndexResult<T> {
    match section.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            IndexError::InvalidConfig(format!("{}.{} has invalid value '{}'", name, key, raw))
        }),
    }
}
