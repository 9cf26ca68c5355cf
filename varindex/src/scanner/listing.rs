//! Filesystem listing of package files.
//!
//! The listing is the only filesystem primitive the engine owns: it records
//! `(path → size, mtime, origin)` for every package file under the configured
//! roots and valid external destinations. Parsing the files is left to the
//! caller's [`PackageParser`](crate::index::PackageParser).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::config::{ExternalDestination, ScanRoot};
use crate::package::{has_package_extension, EntryOrigin};

/// Size and modification time of a file: the change-detection signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileStamp {
    pub size: u64,
    pub modified: SystemTime,
}

impl FileStamp {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        Self { size, modified }
    }

    /// Read the stamp of a file from disk.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }
}

/// A package file found by the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub stamp: FileStamp,
    pub origin: EntryOrigin,
}

/// Snapshot of package files on disk (or as last indexed), ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListing {
    files: BTreeMap<PathBuf, ListedFile>,
}

impl FileListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, replacing any previous entry at the same path.
    pub fn insert(&mut self, path: impl Into<PathBuf>, stamp: FileStamp, origin: EntryOrigin) {
        self.files.insert(path.into(), ListedFile { stamp, origin });
    }

    pub fn get(&self, path: &Path) -> Option<&ListedFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &ListedFile)> {
        self.files.iter()
    }

    fn extend(&mut self, other: FileListing) {
        self.files.extend(other.files);
    }
}

impl FromIterator<(PathBuf, ListedFile)> for FileListing {
    fn from_iter<I: IntoIterator<Item = (PathBuf, ListedFile)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// List every package file under the scan roots and valid destinations.
///
/// Roots that do not exist are skipped. Destinations failing
/// [`ExternalDestination::is_valid`] are skipped. Any I/O error while
/// reading an existing directory fails the whole listing: a partial listing
/// would classify unread files as removed.
pub fn list_roots(
    roots: &[ScanRoot],
    destinations: &[ExternalDestination],
    extension: &str,
) -> io::Result<FileListing> {
    let mut sources: Vec<(PathBuf, EntryOrigin)> = roots
        .iter()
        .filter(|root| root.path.is_dir())
        .map(|root| {
            let origin = EntryOrigin::Root {
                root: root.path.clone(),
                status: root.status,
            };
            (root.path.clone(), origin)
        })
        .collect();

    sources.extend(destinations.iter().filter(|d| d.is_valid()).map(|d| {
        let origin = EntryOrigin::External {
            destination: d.name.clone(),
        };
        (d.path.clone(), origin)
    }));

    debug!(sources = sources.len(), "Listing package files");

    let partials: Vec<io::Result<FileListing>> = sources
        .par_iter()
        .map(|(path, origin)| {
            let mut listing = FileListing::new();
            walk_directory(path, origin, extension, &mut listing)?;
            Ok(listing)
        })
        .collect();

    let mut listing = FileListing::new();
    for partial in partials {
        listing.extend(partial?);
    }

    debug!(files = listing.len(), "Package listing complete");
    Ok(listing)
}

fn walk_directory(
    dir: &Path,
    origin: &EntryOrigin,
    extension: &str,
    listing: &mut FileListing,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_directory(&path, origin, extension, listing)?;
        } else if has_package_extension(&path, extension) {
            let stamp = FileStamp::from_path(&path)?;
            trace!(path = %path.display(), size = stamp.size, "Listed package file");
            listing.insert(path, stamp, origin.clone());
        }
    }
    Ok(())
}
