//! Parallel filter evaluation and facet counting.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::criterion::{text_matches, Facet};
use super::snapshot::{FilterSnapshot, OriginSelection};
use crate::cancel::Outcome;
use crate::config::DEFAULT_FILTER_PARTITION_SIZE;
use crate::dedupe::representative_order;
use crate::package::{BaseName, PackageRecord};

/// Evaluates [`FilterSnapshot`]s against record slices.
///
/// Evaluation is pure: the engine holds no state besides its partition size,
/// and the same snapshot over the same records always yields the same
/// result.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    partition_size: usize,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_PARTITION_SIZE)
    }
}

impl FilterEngine {
    pub fn new(partition_size: usize) -> Self {
        Self {
            partition_size: partition_size.max(1),
        }
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Whether `record` passes `snapshot`.
    ///
    /// External records are gated by destination visibility first, then only
    /// by the origin selection, destination selection and search text. Local
    /// records must satisfy every criterion. Duplicate collapsing is not a
    /// property of a single record: [`filter`] and cascading
    /// [`facet_counts`] apply it to the matching set afterwards.
    ///
    /// [`filter`]: Self::filter
    /// [`facet_counts`]: Self::facet_counts
    pub fn matches(&self, record: &PackageRecord, snapshot: &FilterSnapshot) -> bool {
        if let Some(destination) = record.destination() {
            snapshot.is_destination_visible(destination)
                && snapshot.origin() != OriginSelection::Local
                && snapshot.is_destination_selected(destination)
                && text_matches(record, snapshot.search())
        } else {
            snapshot.origin() != OriginSelection::External
                && text_matches(record, snapshot.search())
                && snapshot.criteria().iter().all(|c| c.matches(record))
        }
    }

    /// Records visible under `snapshot`, in input order.
    ///
    /// Records are evaluated in parallel partitions; `token` is checked
    /// before each partition and once more at the end. When the snapshot
    /// collapses duplicates, each duplicate group keeps only its first
    /// matching member in representative order.
    pub fn filter(
        &self,
        records: &[Arc<PackageRecord>],
        snapshot: &FilterSnapshot,
        token: &CancellationToken,
    ) -> Outcome<Vec<Arc<PackageRecord>>> {
        let visible = match self.visibility(records, snapshot, token) {
            Outcome::Completed(visible) => visible,
            Outcome::Cancelled => {
                trace!(records = records.len(), "Filter evaluation cancelled");
                return Outcome::Cancelled;
            }
        };

        let matched: Vec<Arc<PackageRecord>> = records
            .iter()
            .zip(visible)
            .filter_map(|(record, visible)| visible.then(|| Arc::clone(record)))
            .collect();
        debug!(records = records.len(), matched = matched.len(), "Filter evaluated");
        Outcome::Completed(matched)
    }

    /// Count records per label of `facet`, ordered by count descending then
    /// label ascending.
    ///
    /// With a cascading snapshot only records visible under it are counted,
    /// duplicate collapsing included; otherwise every record is.
    pub fn facet_counts(
        &self,
        facet: Facet,
        records: &[Arc<PackageRecord>],
        snapshot: Option<&FilterSnapshot>,
    ) -> Vec<(String, usize)> {
        let visible = match snapshot.filter(|s| s.cascading()) {
            Some(snapshot) => self
                .visibility(records, snapshot, &CancellationToken::new())
                .completed()
                .unwrap_or_default(),
            None => vec![true; records.len()],
        };

        let counts: HashMap<String, usize> = records
            .par_chunks(self.partition_size)
            .zip(visible.par_chunks(self.partition_size))
            .map(|(partition, shown)| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for (record, &visible) in partition.iter().zip(shown) {
                    if !visible {
                        continue;
                    }
                    for label in facet.labels(record) {
                        *counts.entry(label).or_insert(0) += 1;
                    }
                }
                counts
            })
            .reduce(HashMap::new, |mut left, right| {
                for (label, count) in right {
                    *left.entry(label).or_insert(0) += count;
                }
                left
            });

        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Per-record visibility under `snapshot`: [`matches`] evaluated in
    /// parallel, then duplicate collapsing when the snapshot asks for it.
    ///
    /// [`matches`]: Self::matches
    fn visibility(
        &self,
        records: &[Arc<PackageRecord>],
        snapshot: &FilterSnapshot,
        token: &CancellationToken,
    ) -> Outcome<Vec<bool>> {
        self.evaluate(records, token, |record| self.matches(record, snapshot))
            .map(|mut visible| {
                if snapshot.collapse_duplicates() {
                    collapse_duplicates(records, &mut visible);
                }
                visible
            })
    }

    fn evaluate<F>(
        &self,
        records: &[Arc<PackageRecord>],
        token: &CancellationToken,
        predicate: F,
    ) -> Outcome<Vec<bool>>
    where
        F: Fn(&PackageRecord) -> bool + Sync,
    {
        let partitions: Vec<Option<Vec<bool>>> = records
            .par_chunks(self.partition_size)
            .map(|partition| {
                if token.is_cancelled() {
                    return None;
                }
                Some(partition.iter().map(|record| predicate(record.as_ref())).collect())
            })
            .collect();

        if token.is_cancelled() || partitions.iter().any(Option::is_none) {
            return Outcome::Cancelled;
        }
        Outcome::Completed(partitions.into_iter().flatten().flatten().collect())
    }

    /// External records per destination, regardless of visibility or any
    /// filter.
    pub fn destination_totals(&self, records: &[Arc<PackageRecord>]) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for destination in records.iter().filter_map(|r| r.destination()) {
            *totals.entry(destination.to_string()).or_insert(0) += 1;
        }
        totals
    }
}

/// Keep, per duplicate group, only the first visible member in
/// representative order.
fn collapse_duplicates(records: &[Arc<PackageRecord>], visible: &mut [bool]) {
    let mut kept: HashMap<&BaseName, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        if !visible[i] || !record.is_duplicate() {
            continue;
        }
        match kept.entry(record.base()) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if representative_order(record, &records[current]).is_lt() {
                    visible[current] = false;
                    slot.insert(i);
                } else {
                    visible[i] = false;
                }
            }
        }
    }
}
