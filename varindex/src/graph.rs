//! Reverse dependency index.
//!
//! Built from one store generation and its [`VersionResolver`]: every
//! record's dependency references are expanded to concrete keys, and the
//! resulting edges are stored both forward (record → dependencies) and
//! reversed (dependency → dependents). The reversed map makes
//! "who depends on me" an O(1) lookup.
//!
//! # Edge Rules
//!
//! - Alias references (`latest`, `minN`) are resolved first; the edge
//!   points at the concrete key.
//! - Unresolvable references produce no edge. They are kept per record as
//!   missing dependencies.
//! - A reference resolving to the record's own package version is ignored.
//! - Dependents are counted by record identity: two references from the
//!   same record to the same key count once.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use rayon::prelude::*;
use tracing::debug;

use crate::package::{DependencyRef, MetadataKey};
use crate::resolver::VersionResolver;
use crate::store::StoreSnapshot;

/// Resolved edges of one record.
struct ResolvedRecord {
    key: MetadataKey,
    dependencies: Vec<MetadataKey>,
    missing: Vec<DependencyRef>,
}

/// Dependency adjacency of one store generation.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    generation: u64,
    dependents: HashMap<MetadataKey, HashSet<MetadataKey>>,
    dependencies: HashMap<MetadataKey, Vec<MetadataKey>>,
    missing: HashMap<MetadataKey, Vec<DependencyRef>>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the graph in O(V + E).
    ///
    /// Resolution runs in parallel per record; the maps are assembled
    /// sequentially afterwards.
    pub fn build(snapshot: &StoreSnapshot, resolver: &VersionResolver) -> Self {
        let resolved: Vec<ResolvedRecord> = snapshot
            .records()
            .par_iter()
            .map(|record| {
                let own = record.key.without_suffix();
                let mut dependencies = BTreeSet::new();
                let mut missing = Vec::new();

                for dependency in &record.dependencies {
                    match resolver.resolve(dependency) {
                        Some(target) if target == own => {}
                        Some(target) => {
                            dependencies.insert(target);
                        }
                        None => missing.push(dependency.clone()),
                    }
                }

                ResolvedRecord {
                    key: record.key.clone(),
                    dependencies: dependencies.into_iter().collect(),
                    missing,
                }
            })
            .collect();

        let mut graph = Self {
            generation: snapshot.generation(),
            ..Self::default()
        };

        for record in resolved {
            for target in &record.dependencies {
                graph
                    .dependents
                    .entry(target.clone())
                    .or_default()
                    .insert(record.key.clone());
            }
            graph.edge_count += record.dependencies.len();
            if !record.dependencies.is_empty() {
                graph.dependencies.insert(record.key.clone(), record.dependencies);
            }
            if !record.missing.is_empty() {
                graph.missing.insert(record.key, record.missing);
            }
        }

        debug!(
            generation = graph.generation,
            edges = graph.edge_count,
            targets = graph.dependents.len(),
            with_missing = graph.missing.len(),
            "Built dependency graph"
        );

        graph
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of distinct records depending on `key`.
    pub fn dependents_count(&self, key: &MetadataKey) -> usize {
        self.dependents.get(key).map_or(0, HashSet::len)
    }

    /// Records depending on `key`, sorted.
    pub fn dependents(&self, key: &MetadataKey) -> BTreeSet<MetadataKey> {
        self.dependents
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolved dependencies of `key`, sorted.
    pub fn dependencies(&self, key: &MetadataKey) -> &[MetadataKey] {
        self.dependencies.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// References of `key` that did not resolve.
    pub fn missing_dependencies(&self, key: &MetadataKey) -> &[DependencyRef] {
        self.missing.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every key reachable from `key` through dependency edges, in
    /// breadth-first order. `key` itself is excluded; cycles terminate.
    pub fn transitive_dependencies(&self, key: &MetadataKey) -> Vec<MetadataKey> {
        let mut seen: HashSet<&MetadataKey> = HashSet::new();
        let mut queue: VecDeque<&MetadataKey> = VecDeque::new();
        let mut order = Vec::new();

        seen.insert(key);
        queue.push_back(key);

        while let Some(current) = queue.pop_front() {
            for next in self.dependencies(current) {
                if seen.insert(next) {
                    order.push(next.clone());
                    queue.push_back(next);
                }
            }
        }

        order
    }

    /// Total number of resolved, deduplicated edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
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

    fn entry(creator: &str, name: &str, version: u32, deps: &[&str]) -> ScanEntry {
        ScanEntry {
            path: PathBuf::from(format!("/lib/{}.{}.{}.var", creator, name, version)),
            origin: EntryOrigin::Root {
                root: PathBuf::from("/lib"),
                status: PackageStatus::Installed,
            },
            size: 1,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            fields: EntryFields::Parsed(ParsedFields {
                creator: creator.to_string(),
                name: name.to_string(),
                version,
                dependencies: deps.iter().map(|d| d.to_string()).collect(),
                content: Default::default(),
                category: None,
                license: None,
            }),
        }
    }

    fn graph_for(store: &MetadataStore) -> DependencyGraph {
        let snapshot = store.snapshot();
        let resolver = VersionResolver::build(&snapshot);
        DependencyGraph::build(&snapshot, &resolver)
    }

    fn key(s: &str) -> MetadataKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_latest_alias_follows_new_version() {
        let store = MetadataStore::default();
        let token = CancellationToken::new();
        let mut entries = vec![
            entry("Alice", "Outfit", 1, &[]),
            entry("Bob", "Scene", 1, &["Alice.Outfit.latest"]),
        ];
        store.ingest(&entries, 0, &token);

        let graph = graph_for(&store);
        assert_eq!(graph.dependents_count(&key("Alice.Outfit.1")), 1);

        entries.push(entry("Alice", "Outfit", 2, &[]));
        store.ingest(&entries, 0, &token);

        let graph = graph_for(&store);
        assert_eq!(graph.dependents_count(&key("Alice.Outfit.2")), 1);
        assert_eq!(graph.dependents_count(&key("Alice.Outfit.1")), 0);
        assert_eq!(graph.generation(), 2);
    }

    #[test]
    fn test_repeated_references_count_once() {
        let store = MetadataStore::default();
        store.ingest(
            &[
                entry("Alice", "Outfit", 2, &[]),
                entry("Bob", "Scene", 1, &["Alice.Outfit.2", "Alice.Outfit.latest", "Alice.Outfit.min1"]),
            ],
            0,
            &CancellationToken::new(),
        );

        let graph = graph_for(&store);
        assert_eq!(graph.dependents_count(&key("Alice.Outfit.2")), 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.dependents(&key("Alice.Outfit.2")).into_iter().collect::<Vec<_>>(),
            vec![key("Bob.Scene.1")]
        );
    }

    #[test]
    fn test_unresolvable_reference_is_missing() {
        let store = MetadataStore::default();
        store.ingest(
            &[entry("Bob", "Scene", 1, &["Carol.Skin.3", "Carol.Hair.latest"])],
            0,
            &CancellationToken::new(),
        );

        let graph = graph_for(&store);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.missing_dependencies(&key("Bob.Scene.1")).len(), 2);
        assert!(graph.dependencies(&key("Bob.Scene.1")).is_empty());
    }

    #[test]
    fn test_self_reference_ignored() {
        let store = MetadataStore::default();
        store.ingest(
            &[entry("Alice", "Outfit", 1, &["Alice.Outfit.latest"])],
            0,
            &CancellationToken::new(),
        );

        let graph = graph_for(&store);
        assert_eq!(graph.dependents_count(&key("Alice.Outfit.1")), 0);
        assert!(graph.missing_dependencies(&key("Alice.Outfit.1")).is_empty());
    }

    #[test]
    fn test_transitive_dependencies_handles_cycles() {
        let store = MetadataStore::default();
        store.ingest(
            &[
                entry("A", "One", 1, &["B.Two.1"]),
                entry("B", "Two", 1, &["C.Three.1"]),
                entry("C", "Three", 1, &["A.One.latest"]),
            ],
            0,
            &CancellationToken::new(),
        );

        let graph = graph_for(&store);
        assert_eq!(
            graph.transitive_dependencies(&key("A.One.1")),
            vec![key("B.Two.1"), key("C.Three.1")]
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property tests
    // ─────────────────────────────────────────────────────────────────────────

    proptest! {
        /// dependents_count equals the number of distinct records whose
        /// resolved dependency set contains the key.
        #[test]
        fn prop_dependents_count_is_distinct_records(
            deps in prop::collection::vec(prop::collection::vec(0usize..6, 0..6), 6)
        ) {
            let entries: Vec<ScanEntry> = deps
                .iter()
                .enumerate()
                .map(|(i, targets)| {
                    let refs: Vec<String> = targets.iter().map(|t| format!("P.N{}.latest", t)).collect();
                    let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
                    entry("P", &format!("N{}", i), 1, &refs)
                })
                .collect();

            let store = MetadataStore::default();
            store.ingest(&entries, 0, &CancellationToken::new());
            let graph = graph_for(&store);

            for target in 0..6 {
                let expected = deps
                    .iter()
                    .enumerate()
                    .filter(|(i, targets)| *i != target && targets.contains(&target))
                    .count();
                let k = key(&format!("P.N{}.1", target));
                prop_assert_eq!(graph.dependents_count(&k), expected);
            }
        }
    }
}
