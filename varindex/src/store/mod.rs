//! Canonical registry of package records.
//!
//! The [`MetadataStore`] owns the current [`StoreSnapshot`] behind an
//! `Arc`. Ingest and patch operations build a complete new snapshot off to
//! the side and publish it with a single pointer swap, so readers iterating
//! an older snapshot are never disturbed and never see a half-built one.
//!
//! # Generations
//!
//! Each published snapshot carries a generation number. The generation is
//! content identity, not an ingest counter: a snapshot is only published
//! (and the generation only advances) when the content fingerprint differs
//! from the current one. Re-ingesting an identical record set is a no-op.
//!
//! ```text
//!  ScanEntry[] ──► record_from_entry ──► assign_keys ──► annotate duplicates
//!                  (parallel, batched)                          │
//!                                                               ▼
//!                        readers ◄── Arc<StoreSnapshot> ◄── publish (swap)
//! ```

mod build;
mod snapshot;

pub use snapshot::StoreSnapshot;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel::Outcome;
use crate::config::IndexConfig;
use crate::package::{MetadataKey, PackageRecord, ScanEntry};

use build::record_from_entry;

/// Summary of an ingest or patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Generation of the snapshot current after the operation.
    pub generation: u64,

    /// Records in that snapshot.
    pub records: usize,

    /// Damaged records in that snapshot.
    pub damaged: usize,

    /// Whether a new snapshot was published.
    pub changed: bool,
}

/// Registry of package records, published as immutable snapshots.
#[derive(Debug)]
pub struct MetadataStore {
    current: RwLock<Arc<StoreSnapshot>>,

    /// Serializes ingest and patch operations.
    ingest_lock: Mutex<()>,

    extension: String,
    batch_size: usize,
}

impl MetadataStore {
    pub fn new(extension: impl Into<String>, batch_size: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(StoreSnapshot::empty())),
            ingest_lock: Mutex::new(()),
            extension: extension.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.package_extension.clone(), config.ingest_batch_size)
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    pub fn get(&self, key: &MetadataKey) -> Option<Arc<PackageRecord>> {
        self.snapshot().get(key).cloned()
    }

    /// Whether an ingest or patch is currently running.
    pub fn is_ingesting(&self) -> bool {
        self.ingest_lock.is_locked()
    }

    /// Replace the store contents with `entries`.
    ///
    /// Entries are converted in batches; `token` is checked between batches
    /// and a cancelled ingest publishes nothing. When the same path appears
    /// more than once the last entry wins. `config_stamp` identifies the
    /// configuration the entries were gathered under and is part of the
    /// content fingerprint.
    pub fn ingest(
        &self,
        entries: &[ScanEntry],
        config_stamp: u64,
        token: &CancellationToken,
    ) -> Outcome<IngestReport> {
        let _guard = self.ingest_lock.lock();

        let mut by_path: HashMap<PathBuf, Arc<PackageRecord>> = HashMap::with_capacity(entries.len());
        for batch in entries.chunks(self.batch_size) {
            if token.is_cancelled() {
                debug!(converted = by_path.len(), total = entries.len(), "Ingest cancelled");
                return Outcome::Cancelled;
            }
            let records: Vec<PackageRecord> = batch
                .par_iter()
                .map(|entry| record_from_entry(entry, &self.extension))
                .collect();
            for record in records {
                by_path.insert(record.path.clone(), Arc::new(record));
            }
        }
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }

        let prepared = StoreSnapshot::assemble(by_path.into_values().collect(), config_stamp);
        Outcome::Completed(self.publish(prepared))
    }

    /// Patch the store: upsert `upserts` (by path) and drop `removed` paths.
    ///
    /// Only the given entries are converted; all other records are carried
    /// over from the current snapshot and shared with it.
    pub fn apply_patch(&self, upserts: &[ScanEntry], removed: &[PathBuf]) -> IngestReport {
        let _guard = self.ingest_lock.lock();
        let current = self.snapshot();

        let replaced: HashSet<&PathBuf> = removed.iter().chain(upserts.iter().map(|e| &e.path)).collect();

        let mut records: Vec<Arc<PackageRecord>> = current
            .records()
            .iter()
            .filter(|r| !replaced.contains(&r.path))
            .cloned()
            .collect();

        let mut fresh: HashMap<PathBuf, Arc<PackageRecord>> = HashMap::with_capacity(upserts.len());
        let converted: Vec<PackageRecord> = upserts
            .par_iter()
            .map(|entry| record_from_entry(entry, &self.extension))
            .collect();
        for record in converted {
            fresh.insert(record.path.clone(), Arc::new(record));
        }
        records.extend(fresh.into_values());

        debug!(
            upserts = upserts.len(),
            removed = removed.len(),
            records = records.len(),
            "Applying store patch"
        );

        let prepared = StoreSnapshot::assemble(records, current.config_stamp());
        self.publish(prepared)
    }

    /// Publish `prepared` unless its content matches the current snapshot.
    ///
    /// Callers hold the ingest lock.
    fn publish(&self, prepared: StoreSnapshot) -> IngestReport {
        let current = self.snapshot();

        if prepared.fingerprint() == current.fingerprint() {
            debug!(generation = current.generation(), "Store content unchanged; keeping generation");
            return IngestReport {
                generation: current.generation(),
                records: current.len(),
                damaged: current.damaged().count(),
                changed: false,
            };
        }

        let generation = current.generation() + 1;
        let snapshot = Arc::new(prepared.with_generation(generation));
        let report = IngestReport {
            generation,
            records: snapshot.len(),
            damaged: snapshot.damaged().count(),
            changed: true,
        };
        *self.current.write() = snapshot;

        info!(
            generation = report.generation,
            records = report.records,
            damaged = report.damaged,
            "Published store snapshot"
        );
        report
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}
