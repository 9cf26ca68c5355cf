//! Package records and the raw scan entries they are built from.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::key::{BaseName, DependencyRef, MetadataKey};
use crate::error::IndexError;
use crate::scanner::FileStamp;

/// Where a package file lives, from the library's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// Loaded by the application.
    Installed,
    /// Present in the library but not loaded.
    Available,
    /// Moved to the archive folder.
    Archived,
    /// Hosted on an external destination.
    External,
}

impl PackageStatus {
    /// All statuses, in declaration order.
    pub const ALL: [PackageStatus; 4] = [
        PackageStatus::Installed,
        PackageStatus::Available,
        PackageStatus::Archived,
        PackageStatus::External,
    ];

    /// Rank used to decide which record of a group gets the plain key and
    /// which one represents a duplicate group. Lower wins.
    pub fn priority(self) -> u8 {
        match self {
            PackageStatus::Installed => 0,
            PackageStatus::External => 1,
            PackageStatus::Available => 2,
            PackageStatus::Archived => 3,
        }
    }

    /// Lowercase label, also used as key suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            PackageStatus::Installed => "installed",
            PackageStatus::Available => "available",
            PackageStatus::Archived => "archived",
            PackageStatus::External => "external",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "installed" => Ok(PackageStatus::Installed),
            "available" => Ok(PackageStatus::Available),
            "archived" => Ok(PackageStatus::Archived),
            "external" => Ok(PackageStatus::External),
            other => Err(IndexError::InvalidConfig(format!("unknown package status '{}'", other))),
        }
    }
}

/// Kinds of content a package can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentType {
    Morphs,
    Hair,
    Clothing,
    Scenes,
    Looks,
    Poses,
    Assets,
    Scripts,
    Plugins,
    Textures,
    Sounds,
}

impl ContentType {
    pub fn label(self) -> &'static str {
        match self {
            ContentType::Morphs => "morphs",
            ContentType::Hair => "hair",
            ContentType::Clothing => "clothing",
            ContentType::Scenes => "scenes",
            ContentType::Looks => "looks",
            ContentType::Poses => "poses",
            ContentType::Assets => "assets",
            ContentType::Scripts => "scripts",
            ContentType::Plugins => "plugins",
            ContentType::Textures => "textures",
            ContentType::Sounds => "sounds",
        }
    }
}

/// Per-type content counts extracted from a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCounts {
    pub morphs: u32,
    pub hair: u32,
    pub clothing: u32,
    pub scenes: u32,
    pub looks: u32,
    pub poses: u32,
    pub assets: u32,
    pub scripts: u32,
    pub plugins: u32,
    pub textures: u32,
    pub sounds: u32,
}

impl ContentCounts {
    /// Count for a single content type.
    pub fn get(&self, content: ContentType) -> u32 {
        match content {
            ContentType::Morphs => self.morphs,
            ContentType::Hair => self.hair,
            ContentType::Clothing => self.clothing,
            ContentType::Scenes => self.scenes,
            ContentType::Looks => self.looks,
            ContentType::Poses => self.poses,
            ContentType::Assets => self.assets,
            ContentType::Scripts => self.scripts,
            ContentType::Plugins => self.plugins,
            ContentType::Textures => self.textures,
            ContentType::Sounds => self.sounds,
        }
    }

    /// Content types with a non-zero count.
    pub fn present(&self) -> impl Iterator<Item = ContentType> + '_ {
        [
            ContentType::Morphs,
            ContentType::Hair,
            ContentType::Clothing,
            ContentType::Scenes,
            ContentType::Looks,
            ContentType::Poses,
            ContentType::Assets,
            ContentType::Scripts,
            ContentType::Plugins,
            ContentType::Textures,
            ContentType::Sounds,
        ]
        .into_iter()
        .filter(move |content| self.get(*content) > 0)
    }

    pub fn total(&self) -> u32 {
        self.present().map(|content| self.get(content)).sum()
    }
}

/// How a scanned file reached the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Found under one of the configured scan roots.
    Root { root: PathBuf, status: PackageStatus },
    /// Found under an external destination.
    External { destination: String },
}

impl EntryOrigin {
    pub fn status(&self) -> PackageStatus {
        match self {
            EntryOrigin::Root { status, .. } => *status,
            EntryOrigin::External { .. } => PackageStatus::External,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            EntryOrigin::Root { .. } => None,
            EntryOrigin::External { destination } => Some(destination),
        }
    }
}

/// Fields extracted from a package by the upstream parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    pub creator: String,
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub content: ContentCounts,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// Parser output for one file: either the parsed fields or a failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryFields {
    Parsed(ParsedFields),
    Failed(String),
}

/// One raw per-file scan result, as handed over by the scanner and parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub origin: EntryOrigin,
    pub size: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub fields: EntryFields,
}

impl ScanEntry {
    /// The `(size, mtime)` pair the incremental scanner compares against.
    pub fn stamp(&self) -> FileStamp {
        FileStamp::new(self.size, self.modified)
    }
}

/// Location of a record, used to decide whether two records of the same
/// package are duplicates of each other: the scan root it was found under,
/// or its external destination. Subfolders of one root are one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Root(PathBuf),
    Destination(String),
}

/// Canonical metadata for one package file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    pub key: MetadataKey,
    pub status: PackageStatus,
    pub path: PathBuf,
    pub origin: EntryOrigin,
    pub size: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub dependencies: Vec<DependencyRef>,
    pub content: ContentCounts,
    pub category: Option<String>,
    pub license: Option<String>,

    /// Number of distinct locations holding this package (1 if unique).
    pub duplicate_location_count: u32,

    /// Whether this record is the first of its duplicate group in
    /// representative order. Collapsed views show it whenever it passes the
    /// filter.
    pub duplicate_representative: bool,

    /// Reason the package could not be fully parsed.
    pub damage: Option<String>,
}

impl PackageRecord {
    pub fn base(&self) -> &BaseName {
        self.key.base()
    }

    pub fn creator(&self) -> &str {
        self.key.base().creator()
    }

    pub fn name(&self) -> &str {
        self.key.base().name()
    }

    pub fn version(&self) -> u32 {
        self.key.version()
    }

    pub fn is_damaged(&self) -> bool {
        self.damage.is_some()
    }

    pub fn is_external(&self) -> bool {
        self.status == PackageStatus::External
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_location_count > 1
    }

    pub fn destination(&self) -> Option<&str> {
        self.origin.destination()
    }

    /// File name component of the path, or an empty string.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn location(&self) -> Location {
        match &self.origin {
            EntryOrigin::External { destination } => Location::Destination(destination.clone()),
            EntryOrigin::Root { root, .. } => Location::Root(root.clone()),
        }
    }

    pub fn stamp(&self) -> FileStamp {
        FileStamp::new(self.size, self.modified)
    }

    /// Seconds since the Unix epoch of the modification time.
    pub fn modified_secs(&self) -> u64 {
        self.modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_priority_order() {
        let mut statuses = PackageStatus::ALL.to_vec();
        statuses.sort_by_key(|s| s.priority());
        assert_eq!(
            statuses,
            vec![
                PackageStatus::Installed,
                PackageStatus::External,
                PackageStatus::Available,
                PackageStatus::Archived
            ]
        );
    }

    #[test]
    fn test_status_parse_case_insensitive() {
        assert_eq!(
            "Archived".parse::<PackageStatus>().unwrap(),
            PackageStatus::Archived
        );
        assert!("deleted".parse::<PackageStatus>().is_err());
    }

    #[test]
    fn test_content_counts_present() {
        let content = ContentCounts {
            morphs: 3,
            scenes: 1,
            ..Default::default()
        };
        let present: Vec<_> = content.present().collect();
        assert_eq!(present, vec![ContentType::Morphs, ContentType::Scenes]);
        assert_eq!(content.total(), 4);
    }

    #[test]
    fn test_origin_status() {
        let root = EntryOrigin::Root {
            root: PathBuf::from("/lib"),
            status: PackageStatus::Archived,
        };
        let external = EntryOrigin::External {
            destination: "nas".to_string(),
        };
        assert_eq!(root.status(), PackageStatus::Archived);
        assert_eq!(external.status(), PackageStatus::External);
        assert_eq!(external.destination(), Some("nas"));
    }

    #[test]
    fn test_scan_entry_deserializes_from_manifest_json() {
        let json = r#"{
            "path": "/lib/AddonPackages/Alice.Outfit.1.var",
            "origin": {"kind": "root", "root": "/lib/AddonPackages", "status": "installed"},
            "size": 42,
            "created": {"secs_since_epoch": 10, "nanos_since_epoch": 0},
            "modified": {"secs_since_epoch": 20, "nanos_since_epoch": 0},
            "fields": {"parsed": {"creator": "Alice", "name": "Outfit", "version": 1,
                                  "dependencies": ["Bob.Hair.latest"]}}
        }"#;
        let entry: ScanEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.size, 42);
        assert_eq!(entry.origin.status(), PackageStatus::Installed);
        match entry.fields {
            EntryFields::Parsed(fields) => {
                assert_eq!(fields.dependencies, vec!["Bob.Hair.latest".to_string()]);
                assert_eq!(fields.content, ContentCounts::default());
            }
            EntryFields::Failed(_) => panic!("expected parsed fields"),
        }
    }
}
