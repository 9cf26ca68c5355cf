//! Latest-version tracking and alias resolution.
//!
//! The resolver is a derived view of one store generation. It records every
//! version known for each base name, so `Creator.Name.latest` and
//! `Creator.Name.minN` references can be expanded to a concrete key.
//!
//! Resolved keys are always plain (unsuffixed) keys: every `(base, version)`
//! group present in the store has exactly one member holding the plain key.

use std::collections::HashMap;

use tracing::debug;

use crate::package::{BaseName, DependencyRef, MetadataKey};
use crate::store::StoreSnapshot;

/// Version table of one store generation.
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    generation: u64,

    /// Known versions per base name, sorted ascending and deduplicated.
    versions: HashMap<BaseName, Vec<u32>>,
}

impl VersionResolver {
    /// Build the version table in a single pass over the snapshot.
    pub fn build(snapshot: &StoreSnapshot) -> Self {
        let mut versions: HashMap<BaseName, Vec<u32>> = HashMap::new();
        for record in snapshot.records() {
            versions
                .entry(record.base().clone())
                .or_default()
                .push(record.version());
        }
        for list in versions.values_mut() {
            list.sort_unstable();
            list.dedup();
        }

        debug!(
            generation = snapshot.generation(),
            bases = versions.len(),
            "Built version resolver"
        );

        Self {
            generation: snapshot.generation(),
            versions,
        }
    }

    /// Store generation this table was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn max_version(&self, base: &BaseName) -> Option<u32> {
        self.versions.get(base).and_then(|v| v.last().copied())
    }

    /// Whether `key` carries the highest known version of its base name.
    pub fn is_latest(&self, key: &MetadataKey) -> bool {
        self.max_version(key.base()) == Some(key.version())
    }

    /// Plain key of the highest version of `base`.
    pub fn latest_key(&self, base: &BaseName) -> Option<MetadataKey> {
        self.max_version(base)
            .map(|version| MetadataKey::new(base.clone(), version))
    }

    /// All known versions of `base`, ascending.
    pub fn versions(&self, base: &BaseName) -> &[u32] {
        self.versions.get(base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Expand a dependency reference to a concrete key.
    ///
    /// - `Exact` resolves to itself only when that version is present.
    /// - `Latest` resolves to the highest present version.
    /// - `Minimum` resolves like `Latest` when the highest version is at
    ///   least the requested one.
    pub fn resolve(&self, dependency: &DependencyRef) -> Option<MetadataKey> {
        match dependency {
            DependencyRef::Exact { base, version } => self
                .versions(base)
                .binary_search(version)
                .ok()
                .map(|_| MetadataKey::new(base.clone(), *version)),
            DependencyRef::Latest { base } => self.latest_key(base),
            DependencyRef::Minimum { base, version } => self
                .latest_key(base)
                .filter(|latest| latest.version() >= *version),
        }
    }

    /// Number of distinct base names.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{EntryFields, EntryOrigin, PackageStatus, ParsedFields, ScanEntry};
    use crate::store::MetadataStore;
    use proptest::prelude::*;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tokio_util::sync::CancellationToken;

    fn entry(creator: &str, name: &str, version: u32, dir: &str) -> ScanEntry {
        ScanEntry {
            path: PathBuf::from(format!("{}/{}.{}.{}.var", dir, creator, name, version)),
            origin: EntryOrigin::Root {
                root: PathBuf::from(dir),
                status: PackageStatus::Installed,
            },
            size: 1,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            fields: EntryFields::Parsed(ParsedFields {
                creator: creator.to_string(),
                name: name.to_string(),
                version,
                dependencies: Vec::new(),
                content: Default::default(),
                category: None,
                license: None,
            }),
        }
    }

    fn resolver_for(entries: &[ScanEntry]) -> VersionResolver {
        let store = MetadataStore::default();
        store.ingest(entries, 0, &CancellationToken::new());
        VersionResolver::build(&store.snapshot())
    }

    fn dep(s: &str) -> DependencyRef {
        s.parse().unwrap()
    }

    #[test]
    fn test_max_version_and_is_latest() {
        let resolver = resolver_for(&[
            entry("Alice", "Outfit", 1, "/lib"),
            entry("Alice", "Outfit", 3, "/lib"),
            entry("Alice", "Outfit", 2, "/lib"),
        ]);
        let base = BaseName::new("Alice", "Outfit");

        assert_eq!(resolver.max_version(&base), Some(3));
        assert_eq!(resolver.versions(&base), &[1, 2, 3]);
        assert!(resolver.is_latest(&"Alice.Outfit.3".parse().unwrap()));
        assert!(!resolver.is_latest(&"Alice.Outfit.2".parse().unwrap()));
        assert_eq!(resolver.generation(), 1);
    }

    #[test]
    fn test_suffixed_key_of_latest_version_is_latest() {
        let resolver = resolver_for(&[
            entry("Alice", "Outfit", 3, "/a"),
            entry("Alice", "Outfit", 3, "/b"),
        ]);
        assert!(resolver.is_latest(&"Alice.Outfit.3#installed".parse().unwrap()));
    }

    #[test]
    fn test_resolve_latest_alias() {
        let resolver = resolver_for(&[
            entry("Alice", "Outfit", 1, "/lib"),
            entry("Alice", "Outfit", 2, "/lib"),
        ]);
        assert_eq!(
            resolver.resolve(&dep("Alice.Outfit.latest")),
            Some("Alice.Outfit.2".parse().unwrap())
        );
        assert_eq!(resolver.resolve(&dep("Bob.Hair.latest")), None);
    }

    #[test]
    fn test_resolve_exact_requires_presence() {
        let resolver = resolver_for(&[entry("Alice", "Outfit", 1, "/lib")]);
        assert_eq!(
            resolver.resolve(&dep("Alice.Outfit.1")),
            Some("Alice.Outfit.1".parse().unwrap())
        );
        assert_eq!(resolver.resolve(&dep("Alice.Outfit.5")), None);
    }

    #[test]
    fn test_resolve_minimum_alias() {
        let resolver = resolver_for(&[
            entry("Alice", "Outfit", 4, "/lib"),
            entry("Alice", "Outfit", 6, "/lib"),
        ]);
        assert_eq!(
            resolver.resolve(&dep("Alice.Outfit.min5")),
            Some("Alice.Outfit.6".parse().unwrap())
        );
        assert_eq!(resolver.resolve(&dep("Alice.Outfit.min7")), None);
    }

    #[test]
    fn test_empty_snapshot() {
        let resolver = VersionResolver::build(&StoreSnapshot::empty());
        assert!(resolver.is_empty());
        assert_eq!(resolver.latest_key(&BaseName::new("A", "B")), None);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property tests
    // ─────────────────────────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn prop_latest_resolves_to_maximum(versions in prop::collection::vec(0u32..50, 1..20)) {
            let entries: Vec<ScanEntry> = versions
                .iter()
                .map(|v| entry("Alice", "Outfit", *v, "/lib"))
                .collect();
            let resolver = resolver_for(&entries);
            let max = versions.iter().copied().max().unwrap();

            let resolved = resolver.resolve(&dep("Alice.Outfit.latest")).unwrap();
            prop_assert_eq!(resolved.version(), max);
            prop_assert!(resolver.is_latest(&resolved));
        }

        #[test]
        fn prop_exact_resolves_iff_present(
            versions in prop::collection::vec(0u32..20, 1..10),
            wanted in 0u32..20,
        ) {
            let entries: Vec<ScanEntry> = versions
                .iter()
                .map(|v| entry("Alice", "Outfit", *v, "/lib"))
                .collect();
            let resolver = resolver_for(&entries);

            let resolved = resolver.resolve(&DependencyRef::Exact {
                base: BaseName::new("Alice", "Outfit"),
                version: wanted,
            });
            prop_assert_eq!(resolved.is_some(), versions.contains(&wanted));
        }
    }
}
