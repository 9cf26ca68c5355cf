//! Package identity, records and scan entries.
//!
//! # Type Hierarchy
//!
//! ```text
//! ScanEntry (input)                 PackageRecord (canonical)
//! ├── path, origin                  ├── key: MetadataKey ──► BaseName + version + suffix
//! ├── size, created, modified       ├── status, path, origin, size, timestamps
//! └── fields: Parsed | Failed       ├── dependencies: Vec<DependencyRef>
//!                                   ├── content, category, license
//!                                   ├── duplicate annotations
//!                                   └── damage: Option<String>
//! ```
//!
//! A [`ScanEntry`] is what the scanner and the external parser hand over; the
//! store turns it into a [`PackageRecord`] and assigns the record's
//! [`MetadataKey`].

mod key;
mod naming;
mod record;

pub use key::{BaseName, DependencyRef, KeySuffix, MetadataKey};
pub use naming::{
    fallback_identity, has_package_extension, package_filename, parse_package_filename,
    UNKNOWN_CREATOR,
};
pub use record::{
    ContentCounts, ContentType, EntryFields, EntryOrigin, Location, PackageRecord, PackageStatus,
    ParsedFields, ScanEntry,
};
