//! The package index facade.
//!
//! [`PackageIndex`] owns the [`MetadataStore`], the derived views, the
//! incremental scanner and the filter request supervisor, and exposes the
//! query, filter and refresh operations consumers use.
//!
//! # Derived Views
//!
//! The [`VersionResolver`] and [`DependencyGraph`] are computed lazily from
//! the store's current snapshot and cached together with its generation.
//! When a query finds the cached views stale it rebuilds them first.
//!
//! # Threading
//!
//! Every method takes `&self`. Full rescans and filters can be moved onto
//! tokio's blocking pool through the `spawn_*` variants, which require the
//! index to live in an `Arc`. Each spawned request supersedes the previous
//! one of its kind.
//!
//! # Example
//!
//! ```
//! use varindex::{IndexConfig, PackageIndex};
//!
//! let index = PackageIndex::new(IndexConfig::default());
//! assert_eq!(index.generation(), 0);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::{Outcome, RequestSupervisor, RequestTicket};
use crate::config::{ExternalDestination, IndexConfig};
use crate::dedupe::DuplicateGroup;
use crate::error::{IndexError, IndexResult};
use crate::filter::{Facet, FilterEngine, FilterSnapshot, FilterState};
use crate::graph::DependencyGraph;
use crate::package::{BaseName, DependencyRef, EntryOrigin, MetadataKey, PackageRecord, ScanEntry};
use crate::resolver::VersionResolver;
use crate::scanner::{list_roots, IncrementalScanner, ListedFile, ScanDiff, ScanState};
use crate::store::{IngestReport, MetadataStore, StoreSnapshot};

/// Turns a package file into a [`ScanEntry`].
///
/// Implemented by the archive reader; the index only calls it for files an
/// incremental refresh found added or modified. Parse failures are reported
/// through [`EntryFields::Failed`](crate::package::EntryFields::Failed),
/// never as an error.
pub trait PackageParser: Send + Sync {
    fn parse(&self, path: &Path, file: &ListedFile) -> ScanEntry;
}

/// Result of [`PackageIndex::refresh_incrementally`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub diff: ScanDiff,

    /// Store generation after the refresh.
    pub generation: u64,

    pub state: ScanState,
}

/// Resolver and graph of one store generation.
#[derive(Debug)]
struct DerivedViews {
    resolver: VersionResolver,
    graph: DependencyGraph,
}

impl DerivedViews {
    fn build(snapshot: &StoreSnapshot) -> Self {
        let resolver = VersionResolver::build(snapshot);
        let graph = DependencyGraph::build(snapshot, &resolver);
        Self { resolver, graph }
    }

    fn generation(&self) -> u64 {
        self.resolver.generation()
    }
}

/// Marks a full rebuild as running for as long as it lives.
struct RebuildGuard<'a>(&'a AtomicUsize);

impl<'a> RebuildGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Package index over a library of scan roots and external destinations.
#[derive(Debug)]
pub struct PackageIndex {
    config: IndexConfig,
    store: MetadataStore,
    engine: FilterEngine,

    derived: RwLock<Option<Arc<DerivedViews>>>,
    derive_lock: Mutex<()>,

    destinations: RwLock<Arc<Vec<ExternalDestination>>>,

    /// Entries of the last completed full rescan, patched by incremental
    /// refreshes. Source of destination-change rebuilds.
    last_entries: RwLock<Arc<Vec<ScanEntry>>>,

    scanner: Mutex<IncrementalScanner>,

    /// Held while a store change and the matching `last_entries` update are
    /// committed together.
    commit_lock: Mutex<()>,
    rebuilds: AtomicUsize,
    rebuild_requests: RequestSupervisor,
    filter_requests: RequestSupervisor,
}

impl PackageIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            store: MetadataStore::from_config(&config),
            engine: FilterEngine::new(config.filter_partition_size),
            derived: RwLock::new(None),
            derive_lock: Mutex::new(()),
            destinations: RwLock::new(Arc::new(config.destinations.clone())),
            last_entries: RwLock::new(Arc::new(Vec::new())),
            scanner: Mutex::new(IncrementalScanner::new(config.thresholds)),
            commit_lock: Mutex::new(()),
            rebuilds: AtomicUsize::new(0),
            rebuild_requests: RequestSupervisor::new(),
            filter_requests: RequestSupervisor::new(),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn destinations(&self) -> Arc<Vec<ExternalDestination>> {
        Arc::clone(&self.destinations.read())
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.store.snapshot()
    }

    /// Scan entries the store was last built from, including incremental
    /// patches.
    pub fn entries(&self) -> Arc<Vec<ScanEntry>> {
        Arc::clone(&self.last_entries.read())
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.lock().state()
    }

    /// Whether a full rebuild is running.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilds.load(Ordering::SeqCst) > 0
    }

    /// Derived views for the current store generation, rebuilding them when
    /// stale.
    fn views(&self) -> Arc<DerivedViews> {
        let snapshot = self.store.snapshot();
        if let Some(views) = self.fresh_views(snapshot.generation()) {
            return views;
        }

        let _guard = self.derive_lock.lock();
        if let Some(views) = self.fresh_views(snapshot.generation()) {
            return views;
        }

        debug!(generation = snapshot.generation(), "Rebuilding derived views");
        let views = Arc::new(DerivedViews::build(&snapshot));
        *self.derived.write() = Some(Arc::clone(&views));
        views
    }

    fn fresh_views(&self, generation: u64) -> Option<Arc<DerivedViews>> {
        self.derived
            .read()
            .as_ref()
            .filter(|views| views.generation() == generation)
            .cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query API
    // ─────────────────────────────────────────────────────────────────────────

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    pub fn get(&self, key: &MetadataKey) -> Option<Arc<PackageRecord>> {
        self.store.get(key)
    }

    /// Number of distinct records depending on `key`.
    pub fn dependents_count(&self, key: &MetadataKey) -> usize {
        self.views().graph.dependents_count(key)
    }

    pub fn dependents(&self, key: &MetadataKey) -> BTreeSet<MetadataKey> {
        self.views().graph.dependents(key)
    }

    pub fn dependencies(&self, key: &MetadataKey) -> Vec<MetadataKey> {
        self.views().graph.dependencies(key).to_vec()
    }

    pub fn missing_dependencies(&self, key: &MetadataKey) -> Vec<DependencyRef> {
        self.views().graph.missing_dependencies(key).to_vec()
    }

    pub fn transitive_dependencies(&self, key: &MetadataKey) -> Vec<MetadataKey> {
        self.views().graph.transitive_dependencies(key)
    }

    /// Whether `key` is in the store and carries its base name's highest
    /// version.
    pub fn is_latest_version(&self, key: &MetadataKey) -> bool {
        let views = self.views();
        self.store.snapshot().contains(key) && views.resolver.is_latest(key)
    }

    pub fn resolve(&self, dependency: &DependencyRef) -> Option<MetadataKey> {
        self.views().resolver.resolve(dependency)
    }

    pub fn latest_key(&self, base: &BaseName) -> Option<MetadataKey> {
        self.views().resolver.latest_key(base)
    }

    pub fn duplicate_group(&self, base: &BaseName) -> Option<DuplicateGroup> {
        self.store.snapshot().duplicates().group(base).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Filter API
    // ─────────────────────────────────────────────────────────────────────────

    /// Capture `state` with the destination visibility currently in effect.
    pub fn capture_snapshot(&self, state: &FilterState) -> FilterSnapshot {
        state.capture(&self.destinations.read())
    }

    pub fn matches(&self, record: &PackageRecord, snapshot: &FilterSnapshot) -> bool {
        self.engine.matches(record, snapshot)
    }

    /// Facet counts over the current store snapshot.
    pub fn facet_counts(&self, facet: Facet, snapshot: Option<&FilterSnapshot>) -> Vec<(String, usize)> {
        self.engine
            .facet_counts(facet, self.store.snapshot().records(), snapshot)
    }

    /// External records per destination, hidden destinations included.
    pub fn destination_totals(&self) -> BTreeMap<String, usize> {
        self.engine.destination_totals(self.store.snapshot().records())
    }

    /// Start a filter request, superseding the previous one.
    pub fn begin_filter(&self) -> RequestTicket {
        self.filter_requests.begin()
    }

    /// Evaluate `snapshot` over the current store snapshot as the latest
    /// filter request.
    pub fn filter(&self, snapshot: &FilterSnapshot) -> Outcome<Vec<Arc<PackageRecord>>> {
        let ticket = self.begin_filter();
        self.filter_with_token(snapshot, &ticket.token)
    }

    pub fn filter_with_token(
        &self,
        snapshot: &FilterSnapshot,
        token: &CancellationToken,
    ) -> Outcome<Vec<Arc<PackageRecord>>> {
        let store = self.store.snapshot();
        self.engine.filter(store.records(), snapshot, token)
    }

    /// Run [`filter`](Self::filter) on the blocking pool.
    ///
    /// The request supersedes earlier ones as soon as this is called, before
    /// the returned future is polled. Must be called within a tokio runtime.
    pub fn spawn_filter(
        self: &Arc<Self>,
        snapshot: FilterSnapshot,
    ) -> impl Future<Output = IndexResult<Outcome<Vec<Arc<PackageRecord>>>>> {
        let ticket = self.begin_filter();
        let index = Arc::clone(self);
        let handle =
            tokio::task::spawn_blocking(move || index.filter_with_token(&snapshot, &ticket.token));
        async move { handle.await.map_err(|e| IndexError::TaskJoin(e.to_string())) }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh API
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the store with `entries`.
    ///
    /// Supersedes any rebuild already running. External entries whose
    /// destination is unknown or invalid are dropped.
    pub fn full_rescan(&self, entries: Vec<ScanEntry>) -> Outcome<IngestReport> {
        let ticket = self.rebuild_requests.begin();
        self.rebuild(Arc::new(entries), &ticket)
    }

    /// Run [`full_rescan`](Self::full_rescan) on the blocking pool.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn_full_rescan(
        self: &Arc<Self>,
        entries: Vec<ScanEntry>,
    ) -> impl Future<Output = IndexResult<Outcome<IngestReport>>> {
        let ticket = self.rebuild_requests.begin();
        let index = Arc::clone(self);
        let handle =
            tokio::task::spawn_blocking(move || index.rebuild(Arc::new(entries), &ticket));
        async move { handle.await.map_err(|e| IndexError::TaskJoin(e.to_string())) }
    }

    /// Replace the destination configuration and rebuild from the last
    /// entries.
    pub fn set_destinations(&self, destinations: Vec<ExternalDestination>) -> Outcome<IngestReport> {
        info!(destinations = destinations.len(), "Destination configuration changed");
        *self.destinations.write() = Arc::new(destinations);

        let ticket = self.rebuild_requests.begin();
        let entries = Arc::clone(&self.last_entries.read());
        self.rebuild(entries, &ticket)
    }

    fn rebuild(&self, entries: Arc<Vec<ScanEntry>>, ticket: &RequestTicket) -> Outcome<IngestReport> {
        let _rebuilding = RebuildGuard::enter(&self.rebuilds);
        let destinations = self.destinations();

        let accepted = accepted_entries(&entries, &destinations);
        let commit = self.commit_lock.lock();
        let report = match self.store.ingest(&accepted, config_stamp(&destinations), &ticket.token) {
            Outcome::Completed(report) => report,
            Outcome::Cancelled => {
                info!(entries = entries.len(), "Full rescan superseded");
                return Outcome::Cancelled;
            }
        };

        let current = self.rebuild_requests.is_current(ticket);
        if current {
            *self.last_entries.write() = entries;
        }
        drop(commit);

        // A refresh holding the scanner resets it itself once it sees the
        // new generation.
        if current {
            if let Some(mut scanner) = self.scanner.try_lock() {
                scanner.reset();
            }
        }

        info!(
            generation = report.generation,
            records = report.records,
            damaged = report.damaged,
            changed = report.changed,
            "Full rescan complete"
        );
        Outcome::Completed(report)
    }

    /// Reconcile the store with the filesystem.
    ///
    /// Lists the configured roots and valid destinations, diffs the listing
    /// against the store's last-known files and, unless the scanner
    /// recommends a full rescan, parses the added and modified files with
    /// `parser` and patches the store.
    ///
    /// Returns [`IndexError::RebuildInProgress`] while a full rebuild runs,
    /// or when one replaced the store while the changed files were parsed.
    pub fn refresh_incrementally(&self, parser: &dyn PackageParser) -> IndexResult<RefreshOutcome> {
        if self.is_rebuilding() {
            warn!("Incremental refresh rejected: full rebuild in progress");
            return Err(IndexError::RebuildInProgress);
        }

        let mut scanner = self.scanner.lock();
        let snapshot = self.store.snapshot();
        let generation = snapshot.generation();
        let baseline = snapshot.file_listing();
        let destinations = self.destinations();
        let current = list_roots(&self.config.roots, &destinations, &self.config.package_extension);

        let diff = scanner.diff(&baseline, current.as_ref().map_err(clone_io_error));

        let current = match current {
            Ok(current) if !diff.recommend_full_rescan => current,
            _ => {
                return Ok(RefreshOutcome {
                    diff,
                    generation: self.generation(),
                    state: scanner.state(),
                })
            }
        };

        if diff.is_empty() {
            scanner.reset();
            debug!("Incremental refresh found no changes");
            return Ok(RefreshOutcome {
                diff,
                generation: self.generation(),
                state: scanner.state(),
            });
        }

        let upserts: Vec<ScanEntry> = diff
            .added
            .iter()
            .chain(&diff.modified)
            .filter_map(|path| current.get(path).map(|file| parser.parse(path, file)))
            .collect();

        let commit = self.commit_lock.lock();
        if self.is_rebuilding() || self.generation() != generation {
            warn!(
                changed = diff.changed_count(),
                "Discarding incremental patch: store rebuilt while parsing"
            );
            scanner.reset();
            return Err(IndexError::RebuildInProgress);
        }

        let report = self.store.apply_patch(&upserts, &diff.removed);
        self.patch_last_entries(&upserts, &diff.removed);
        drop(commit);
        scanner.mark_patched();

        info!(
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            generation = report.generation,
            "Incremental refresh applied"
        );

        Ok(RefreshOutcome {
            diff,
            generation: report.generation,
            state: scanner.state(),
        })
    }

    fn patch_last_entries(&self, upserts: &[ScanEntry], removed: &[PathBuf]) {
        let mut last = self.last_entries.write();
        let replaced: HashSet<&PathBuf> = removed.iter().chain(upserts.iter().map(|e| &e.path)).collect();

        let mut entries: Vec<ScanEntry> = last
            .iter()
            .filter(|e| !replaced.contains(&e.path))
            .cloned()
            .collect();
        entries.extend(upserts.iter().cloned());
        *last = Arc::new(entries);
    }
}

/// Drop external entries whose destination is unknown or invalid.
fn accepted_entries(entries: &[ScanEntry], destinations: &[ExternalDestination]) -> Vec<ScanEntry> {
    let valid: HashMap<&str, bool> = destinations
        .iter()
        .map(|d| (d.name.as_str(), d.is_valid()))
        .collect();

    let mut dropped = 0usize;
    let accepted: Vec<ScanEntry> = entries
        .iter()
        .filter(|entry| match &entry.origin {
            EntryOrigin::Root { .. } => true,
            EntryOrigin::External { destination } => {
                let keep = valid.get(destination.as_str()).copied().unwrap_or(false);
                if !keep {
                    dropped += 1;
                }
                keep
            }
        })
        .cloned()
        .collect();

    if dropped > 0 {
        warn!(dropped, "Dropped entries from unknown or invalid destinations");
    }
    accepted
}

/// Hash of the destination configuration, folded into the store
/// fingerprint.
fn config_stamp(destinations: &[ExternalDestination]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    destinations.hash(&mut hasher);
    hasher.finish()
}

fn clone_io_error(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{EntryFields, PackageStatus, ParsedFields};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn entry(path: &str, creator: &str, name: &str, version: u32, deps: &[&str]) -> ScanEntry {
        ScanEntry {
            path: PathBuf::from(path),
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

    fn external_entry(path: &str, destination: &str) -> ScanEntry {
        let mut e = entry(path, "Ext", "Pkg", 1, &[]);
        e.origin = EntryOrigin::External {
            destination: destination.to_string(),
        };
        e
    }

    fn key(s: &str) -> MetadataKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_derived_views_follow_generation() {
        let index = PackageIndex::new(IndexConfig::default());
        index.full_rescan(vec![
            entry("/lib/A.B.1.var", "A", "B", 1, &[]),
            entry("/lib/C.D.1.var", "C", "D", 1, &["A.B.latest"]),
        ]);
        assert_eq!(index.dependents_count(&key("A.B.1")), 1);
        assert!(index.is_latest_version(&key("A.B.1")));

        index.full_rescan(vec![
            entry("/lib/A.B.1.var", "A", "B", 1, &[]),
            entry("/lib/A.B.2.var", "A", "B", 2, &[]),
            entry("/lib/C.D.1.var", "C", "D", 1, &["A.B.latest"]),
        ]);
        assert_eq!(index.dependents_count(&key("A.B.1")), 0);
        assert_eq!(index.dependents_count(&key("A.B.2")), 1);
        assert!(!index.is_latest_version(&key("A.B.1")));
    }

    #[test]
    fn test_is_latest_version_requires_presence() {
        let index = PackageIndex::new(IndexConfig::default());
        index.full_rescan(vec![entry("/lib/A.B.2.var", "A", "B", 2, &[])]);
        assert!(!index.is_latest_version(&key("A.B.2#archived")));
        assert!(index.is_latest_version(&key("A.B.2")));
    }

    #[test]
    fn test_invalid_destination_entries_dropped() {
        let dir = TempDir::new().unwrap();
        let config = IndexConfig::default()
            .with_destination(ExternalDestination::new("nas", dir.path()))
            .with_destination(ExternalDestination::new("off", dir.path()).with_enabled(false));
        let index = PackageIndex::new(config);

        let report = index
            .full_rescan(vec![
                external_entry("/nas/Ext.Pkg.1.var", "nas"),
                external_entry("/off/Ext.Pkg.1.var", "off"),
                external_entry("/x/Ext.Pkg.1.var", "nowhere"),
            ])
            .completed()
            .unwrap();

        assert_eq!(report.records, 1);
        assert_eq!(index.destination_totals().get("nas"), Some(&1));
    }

    #[test]
    fn test_set_destinations_rebuilds_from_last_entries() {
        let dir = TempDir::new().unwrap();
        let index = PackageIndex::new(IndexConfig::default());
        index.full_rescan(vec![
            entry("/lib/A.B.1.var", "A", "B", 1, &[]),
            external_entry("/nas/Ext.Pkg.1.var", "nas"),
        ]);
        assert_eq!(index.snapshot().len(), 1);
        let before = index.generation();

        let report = index
            .set_destinations(vec![ExternalDestination::new("nas", dir.path())])
            .completed()
            .unwrap();

        assert_eq!(report.records, 2);
        assert!(report.generation > before);
        assert!(index.get(&key("Ext.Pkg.1")).unwrap().is_external());
    }

    #[test]
    fn test_visibility_change_advances_generation() {
        let dir = TempDir::new().unwrap();
        let shown = ExternalDestination::new("nas", dir.path());
        let index = PackageIndex::new(IndexConfig::default().with_destination(shown.clone()));
        index.full_rescan(vec![external_entry("/nas/Ext.Pkg.1.var", "nas")]);
        let before = index.generation();

        index.set_destinations(vec![shown.with_show_in_main_table(false)]);

        assert_eq!(index.generation(), before + 1);
    }

    #[test]
    fn test_filter_supersedes_previous_request() {
        let index = PackageIndex::new(IndexConfig::default());
        index.full_rescan(vec![entry("/lib/A.B.1.var", "A", "B", 1, &[])]);
        let snapshot = index.capture_snapshot(&FilterState::new());

        let stale = index.begin_filter();
        let fresh = index.begin_filter();

        assert!(index.filter_with_token(&snapshot, &stale.token).is_cancelled());
        let result = index.filter_with_token(&snapshot, &fresh.token).completed().unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_refresh_rejected_during_rebuild() {
        struct NeverCalled;
        impl PackageParser for NeverCalled {
            fn parse(&self, _path: &Path, _file: &ListedFile) -> ScanEntry {
                unreachable!("parser must not run")
            }
        }

        let index = PackageIndex::new(IndexConfig::default());
        let _rebuilding = RebuildGuard::enter(&index.rebuilds);

        let result = index.refresh_incrementally(&NeverCalled);
        assert!(matches!(result, Err(IndexError::RebuildInProgress)));
    }
}
