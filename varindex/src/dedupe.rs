//! Duplicate detection across library locations.
//!
//! The same logical package can be present in several places at once: two
//! scan roots, a root and an external drive, an installed copy and an
//! archived one. Records sharing a base name are grouped; a group whose
//! members live in more than one distinct [`Location`] is a duplicate group.
//!
//! Every member of a duplicate group is annotated with the number of
//! distinct locations, and exactly one member is chosen as the group's
//! representative. The representative is snapshot-independent; collapsing
//! in filtered views keeps the first member in the same order that passes
//! the filter, so a group never disappears because its representative is
//! hidden. The others stay queryable by key.
//!
//! # Representative Selection
//!
//! Members are ordered by:
//!
//! 1. Status priority (installed, external, available, archived)
//! 2. Highest version
//! 3. Lexicographically-first path
//!
//! and the first member wins.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::package::{BaseName, Location, MetadataKey, PackageRecord};

/// A set of records representing one logical package in several locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub base: BaseName,

    /// Keys of all members, in representative order.
    pub members: Vec<MetadataKey>,

    /// Distinct locations, sorted.
    pub locations: Vec<Location>,

    pub representative: MetadataKey,
}

impl DuplicateGroup {
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }
}

/// Duplicate groups of one store generation, keyed by base name.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    groups: HashMap<BaseName, DuplicateGroup>,
}

impl DuplicateIndex {
    /// The duplicate group for a base name, if it has duplicates.
    pub fn group(&self, base: &BaseName) -> Option<&DuplicateGroup> {
        self.groups.get(base)
    }

    /// The canonical member of a duplicate group.
    pub fn representative_of(&self, base: &BaseName) -> Option<&MetadataKey> {
        self.groups.get(base).map(|g| &g.representative)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups ordered by base name.
    pub fn groups(&self) -> Vec<&DuplicateGroup> {
        let mut groups: Vec<_> = self.groups.values().collect();
        groups.sort_by(|a, b| a.base.cmp(&b.base));
        groups
    }
}

/// Groups records and writes the duplicate annotations.
#[derive(Debug, Default)]
pub struct DuplicateDetector;

impl DuplicateDetector {
    pub fn new() -> Self {
        Self
    }

    /// Annotate `records` in place and return the duplicate groups.
    ///
    /// Records are only cloned (copy-on-write) when their annotation
    /// actually changes, so re-annotating a patched snapshot leaves shared
    /// records of untouched groups alone.
    pub fn annotate(&self, records: &mut [Arc<PackageRecord>]) -> DuplicateIndex {
        let mut by_base: HashMap<BaseName, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_base.entry(record.base().clone()).or_default().push(i);
        }

        let mut groups = HashMap::new();

        for (base, mut members) in by_base {
            members.sort_by(|&a, &b| representative_order(&records[a], &records[b]));

            let locations: BTreeSet<Location> =
                members.iter().map(|&i| records[i].location()).collect();
            let count = locations.len() as u32;
            let is_group = count > 1;

            for (position, &i) in members.iter().enumerate() {
                let representative = is_group && position == 0;
                let record = &records[i];
                if record.duplicate_location_count != count
                    || record.duplicate_representative != representative
                {
                    let record = Arc::make_mut(&mut records[i]);
                    record.duplicate_location_count = count;
                    record.duplicate_representative = representative;
                }
            }

            if is_group {
                let members: Vec<MetadataKey> =
                    members.iter().map(|&i| records[i].key.clone()).collect();
                let group = DuplicateGroup {
                    base: base.clone(),
                    representative: members[0].clone(),
                    members,
                    locations: locations.into_iter().collect(),
                };
                groups.insert(base, group);
            }
        }

        debug!(groups = groups.len(), "Annotated duplicate groups");
        DuplicateIndex { groups }
    }
}

pub(crate) fn representative_order(a: &PackageRecord, b: &PackageRecord) -> std::cmp::Ordering {
    let rank = |r: &PackageRecord| (r.status.priority(), Reverse(r.version()));
    rank(a).cmp(&rank(b)).then_with(|| a.path.cmp(&b.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ContentCounts, EntryOrigin, PackageStatus};
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn record(key: &str, path: &str, origin: EntryOrigin) -> Arc<PackageRecord> {
        Arc::new(PackageRecord {
            key: key.parse().unwrap(),
            status: origin.status(),
            path: PathBuf::from(path),
            origin,
            size: 1,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            dependencies: Vec::new(),
            content: ContentCounts::default(),
            category: None,
            license: None,
            duplicate_location_count: 0,
            duplicate_representative: false,
            damage: None,
        })
    }

    fn root(path: &str, status: PackageStatus) -> EntryOrigin {
        EntryOrigin::Root {
            root: PathBuf::from(path),
            status,
        }
    }

    #[test]
    fn test_same_package_in_two_roots_is_duplicate() {
        let mut records = vec![
            record("Creator.Pkg.3", "/a/Creator.Pkg.3.var", root("/a", PackageStatus::Installed)),
            record(
                "Creator.Pkg.3#installed",
                "/b/Creator.Pkg.3.var",
                root("/b", PackageStatus::Installed),
            ),
        ];

        let index = DuplicateDetector::new().annotate(&mut records);

        assert_eq!(records[0].duplicate_location_count, 2);
        assert_eq!(records[1].duplicate_location_count, 2);
        assert_eq!(
            records.iter().filter(|r| r.duplicate_representative).count(),
            1
        );
        let base = BaseName::new("Creator", "Pkg");
        assert_eq!(
            index.representative_of(&base).map(|k| k.to_string()),
            Some("Creator.Pkg.3".to_string())
        );
        assert_eq!(index.group(&base).unwrap().location_count(), 2);
    }

    #[test]
    fn test_versions_in_same_directory_are_not_duplicates() {
        let mut records = vec![
            record("A.B.1", "/a/A.B.1.var", root("/a", PackageStatus::Installed)),
            record("A.B.2", "/a/A.B.2.var", root("/a", PackageStatus::Installed)),
        ];

        let index = DuplicateDetector::new().annotate(&mut records);

        assert!(index.is_empty());
        assert!(records.iter().all(|r| r.duplicate_location_count == 1));
        assert!(records.iter().all(|r| !r.duplicate_representative));
    }

    #[test]
    fn test_subfolders_of_one_root_are_one_location() {
        let root_dir = "/vam/AddonPackages";
        let mut records = vec![
            record(
                "Alice.Outfit.1",
                "/vam/AddonPackages/Alice/Alice.Outfit.1.var",
                root(root_dir, PackageStatus::Installed),
            ),
            record(
                "Alice.Outfit.2",
                "/vam/AddonPackages/Clothing/Alice.Outfit.2.var",
                root(root_dir, PackageStatus::Installed),
            ),
        ];

        let index = DuplicateDetector::new().annotate(&mut records);

        assert!(index.group(&BaseName::new("Alice", "Outfit")).is_none());
        assert!(records.iter().all(|r| r.duplicate_location_count == 1));
    }

    #[test]
    fn test_representative_prefers_status_then_version_then_path() {
        let mut records = vec![
            record("A.B.5#archived", "/arch/A.B.5.var", root("/arch", PackageStatus::Archived)),
            record("A.B.2", "/z/A.B.2.var", root("/z", PackageStatus::Installed)),
            record("A.B.2#installed", "/m/A.B.2.var", root("/m", PackageStatus::Installed)),
        ];

        let index = DuplicateDetector::new().annotate(&mut records);
        let group = index.group(&BaseName::new("A", "B")).unwrap();

        assert_eq!(group.representative.to_string(), "A.B.2#installed");
        assert_eq!(group.members.len(), 3);
        assert_eq!(group.location_count(), 3);
    }

    #[test]
    fn test_external_destination_counts_as_location() {
        let mut records = vec![
            record("A.B.1", "/a/A.B.1.var", root("/a", PackageStatus::Installed)),
            record(
                "A.B.1#external",
                "/nas/A.B.1.var",
                EntryOrigin::External {
                    destination: "nas".to_string(),
                },
            ),
        ];

        DuplicateDetector::new().annotate(&mut records);

        assert!(records.iter().all(|r| r.duplicate_location_count == 2));
        assert!(records[0].duplicate_representative);
    }

    #[test]
    fn test_annotate_leaves_unchanged_records_shared() {
        let mut records = vec![record("A.B.1", "/a/A.B.1.var", root("/a", PackageStatus::Installed))];
        DuplicateDetector::new().annotate(&mut records);

        let shared = Arc::clone(&records[0]);
        DuplicateDetector::new().annotate(&mut records);

        assert!(Arc::ptr_eq(&shared, &records[0]));
    }
}
