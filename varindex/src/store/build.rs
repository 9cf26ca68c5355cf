//! Record construction and key assignment.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::package::{
    fallback_identity, BaseName, DependencyRef, EntryFields, KeySuffix, MetadataKey,
    PackageRecord, PackageStatus, ScanEntry,
};

/// Turn a scan entry into a record with a provisional (unsuffixed) key.
///
/// Never fails: parse failures and invalid identities produce a damaged
/// record whose identity is recovered from the file name.
pub(crate) fn record_from_entry(entry: &ScanEntry, extension: &str) -> PackageRecord {
    let damaged = |reason: String| {
        let (base, version) = fallback_identity(&entry.path, extension);
        debug!(path = %entry.path.display(), reason = %reason, "Recording damaged package");
        blank_record(entry, MetadataKey::new(base, version), Some(reason))
    };

    let fields = match &entry.fields {
        EntryFields::Failed(reason) => return damaged(reason.clone()),
        EntryFields::Parsed(fields) => fields,
    };

    let identity = format!("{}.{}", fields.creator, fields.name);
    let base = match identity.parse::<BaseName>() {
        Ok(base) => base,
        Err(_) => return damaged(format!("invalid package identity '{}'", identity)),
    };

    let dependencies = fields
        .dependencies
        .iter()
        .filter_map(|raw| match raw.parse::<DependencyRef>() {
            Ok(dep) => Some(dep),
            Err(_) => {
                debug!(path = %entry.path.display(), dependency = %raw, "Skipping malformed dependency");
                None
            }
        })
        .collect();

    let mut record = blank_record(entry, MetadataKey::new(base, fields.version), None);
    record.dependencies = dependencies;
    record.content = fields.content.clone();
    record.category = fields.category.clone();
    record.license = fields.license.clone();
    record
}

fn blank_record(entry: &ScanEntry, key: MetadataKey, damage: Option<String>) -> PackageRecord {
    PackageRecord {
        key,
        status: entry.origin.status(),
        path: entry.path.clone(),
        origin: entry.origin.clone(),
        size: entry.size,
        created: entry.created,
        modified: entry.modified,
        dependencies: Vec::new(),
        content: Default::default(),
        category: None,
        license: None,
        duplicate_location_count: 1,
        duplicate_representative: false,
        damage,
    }
}

/// Assign unique keys within every `(base name, version)` group.
///
/// Members are ordered by status priority then path; the first gets the
/// plain key, the rest `#status` or `#status-n`. Records whose key does not
/// change are left shared.
pub(crate) fn assign_keys(records: &mut [Arc<PackageRecord>]) {
    let mut groups: HashMap<MetadataKey, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        groups.entry(record.key.without_suffix()).or_default().push(i);
    }

    for (plain, mut members) in groups {
        members.sort_by(|&a, &b| {
            let (a, b) = (&records[a], &records[b]);
            (a.status.priority(), &a.path).cmp(&(b.status.priority(), &b.path))
        });

        let mut used: HashMap<PackageStatus, u32> = HashMap::new();
        for (position, &i) in members.iter().enumerate() {
            let suffix = if position == 0 {
                None
            } else {
                let status = records[i].status;
                let ordinal = used.entry(status).or_insert(0);
                *ordinal += 1;
                Some(KeySuffix {
                    status,
                    ordinal: *ordinal,
                })
            };
            let key = plain.clone().with_suffix(suffix);
            if records[i].key != key {
                Arc::make_mut(&mut records[i]).key = key;
            }
        }
    }
}

/// Content fingerprint of a key-sorted record set plus the configuration
/// stamp that shaped it.
pub(crate) fn fingerprint(records: &[Arc<PackageRecord>], config_stamp: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    config_stamp.hash(&mut hasher);
    records.len().hash(&mut hasher);
    for record in records {
        record.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ContentCounts, EntryOrigin, ParsedFields};
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn entry(path: &str, status: PackageStatus, fields: EntryFields) -> ScanEntry {
        ScanEntry {
            path: PathBuf::from(path),
            origin: EntryOrigin::Root {
                root: PathBuf::from("/lib"),
                status,
            },
            size: 10,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            fields,
        }
    }

    fn parsed(creator: &str, name: &str, version: u32, deps: &[&str]) -> EntryFields {
        EntryFields::Parsed(ParsedFields {
            creator: creator.to_string(),
            name: name.to_string(),
            version,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            content: ContentCounts::default(),
            category: None,
            license: None,
        })
    }

    #[test]
    fn test_record_from_parsed_entry() {
        let e = entry(
            "/lib/Alice.Outfit.1.var",
            PackageStatus::Installed,
            parsed("Alice", "Outfit", 1, &["Bob.Hair.latest", "not a dep", "Bob.Skin.2"]),
        );
        let record = record_from_entry(&e, "var");

        assert_eq!(record.key.to_string(), "Alice.Outfit.1");
        assert_eq!(record.dependencies.len(), 2);
        assert!(!record.is_damaged());
    }

    #[test]
    fn test_record_from_failed_entry_uses_filename() {
        let e = entry(
            "/lib/Alice.Outfit.4.var",
            PackageStatus::Installed,
            EntryFields::Failed("corrupt meta.json".to_string()),
        );
        let record = record_from_entry(&e, "var");

        assert_eq!(record.key.to_string(), "Alice.Outfit.4");
        assert_eq!(record.damage.as_deref(), Some("corrupt meta.json"));
    }

    #[test]
    fn test_record_with_invalid_identity_is_damaged() {
        let e = entry(
            "/lib/Alice.Outfit.4.var",
            PackageStatus::Installed,
            parsed("Ali.ce", "Outfit", 4, &[]),
        );
        let record = record_from_entry(&e, "var");

        assert!(record.is_damaged());
        assert_eq!(record.key.to_string(), "Alice.Outfit.4");
    }

    #[test]
    fn test_assign_keys_disambiguates_by_status_priority() {
        let mut records: Vec<Arc<PackageRecord>> = [
            ("/arch/A.B.1.var", PackageStatus::Archived),
            ("/avail/A.B.1.var", PackageStatus::Available),
            ("/lib2/A.B.1.var", PackageStatus::Installed),
            ("/lib1/A.B.1.var", PackageStatus::Installed),
            ("/arch2/A.B.1.var", PackageStatus::Archived),
        ]
        .iter()
        .map(|(path, status)| Arc::new(record_from_entry(&entry(path, *status, parsed("A", "B", 1, &[])), "var")))
        .collect();

        assign_keys(&mut records);

        let key_of = |path: &str| {
            records
                .iter()
                .find(|r| r.path == PathBuf::from(path))
                .map(|r| r.key.to_string())
                .unwrap()
        };
        assert_eq!(key_of("/lib1/A.B.1.var"), "A.B.1");
        assert_eq!(key_of("/lib2/A.B.1.var"), "A.B.1#installed");
        assert_eq!(key_of("/avail/A.B.1.var"), "A.B.1#available");
        assert_eq!(key_of("/arch/A.B.1.var"), "A.B.1#archived");
        assert_eq!(key_of("/arch2/A.B.1.var"), "A.B.1#archived-2");
    }

    #[test]
    fn test_fingerprint_changes_with_content_and_config() {
        let record = Arc::new(record_from_entry(
            &entry("/lib/A.B.1.var", PackageStatus::Installed, parsed("A", "B", 1, &[])),
            "var",
        ));
        let base = fingerprint(&[record.clone()], 0);

        assert_eq!(base, fingerprint(&[record.clone()], 0));
        assert_ne!(base, fingerprint(&[record.clone()], 1));

        let mut modified = (*record).clone();
        modified.size += 1;
        assert_ne!(base, fingerprint(&[Arc::new(modified)], 0));
    }
}
