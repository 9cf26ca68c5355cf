//! Immutable, generation-stamped view of the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dedupe::{DuplicateDetector, DuplicateIndex};
use crate::package::{MetadataKey, PackageRecord};
use crate::scanner::{FileListing, ListedFile};

use super::build::{assign_keys, fingerprint};

/// One published generation of the store.
///
/// Snapshots are never mutated after publication. Patching the store builds
/// a new snapshot that shares unchanged records with the previous one.
#[derive(Debug)]
pub struct StoreSnapshot {
    generation: u64,
    fingerprint: u64,
    config_stamp: u64,

    /// Records sorted by key.
    records: Vec<Arc<PackageRecord>>,
    by_key: HashMap<MetadataKey, usize>,
    by_path: HashMap<PathBuf, usize>,
    duplicates: DuplicateIndex,
}

impl StoreSnapshot {
    /// The snapshot of a store that has never ingested anything.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            fingerprint: fingerprint(&[], 0),
            config_stamp: 0,
            records: Vec::new(),
            by_key: HashMap::new(),
            by_path: HashMap::new(),
            duplicates: DuplicateIndex::default(),
        }
    }

    /// Assign keys, annotate duplicates and index a record set.
    ///
    /// The result carries generation 0 until [`with_generation`] stamps it.
    ///
    /// [`with_generation`]: Self::with_generation
    pub(crate) fn assemble(mut records: Vec<Arc<PackageRecord>>, config_stamp: u64) -> Self {
        assign_keys(&mut records);
        let duplicates = DuplicateDetector::new().annotate(&mut records);
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let by_key = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.clone(), i))
            .collect();
        let by_path = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.path.clone(), i))
            .collect();

        Self {
            generation: 0,
            fingerprint: fingerprint(&records, config_stamp),
            config_stamp,
            records,
            by_key,
            by_path,
            duplicates,
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Content identity of this snapshot.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub(crate) fn config_stamp(&self) -> u64 {
        self.config_stamp
    }

    /// All records, sorted by key.
    pub fn records(&self) -> &[Arc<PackageRecord>] {
        &self.records
    }

    pub fn get(&self, key: &MetadataKey) -> Option<&Arc<PackageRecord>> {
        self.by_key.get(key).map(|&i| &self.records[i])
    }

    pub fn contains(&self, key: &MetadataKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn record_by_path(&self, path: &Path) -> Option<&Arc<PackageRecord>> {
        self.by_path.get(path).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duplicates(&self) -> &DuplicateIndex {
        &self.duplicates
    }

    pub fn damaged(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.records.iter().filter(|r| r.is_damaged())
    }

    /// The last-known file list, as the incremental scanner's baseline.
    pub fn file_listing(&self) -> FileListing {
        self.records
            .iter()
            .map(|r| {
                (
                    r.path.clone(),
                    ListedFile {
                        stamp: r.stamp(),
                        origin: r.origin.clone(),
                    },
                )
            })
            .collect()
    }
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
