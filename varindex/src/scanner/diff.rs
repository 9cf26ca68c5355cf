//! Incremental reconciliation of the filesystem against the last index.
//!
//! The scanner compares a baseline listing (what the store last indexed)
//! with the current listing and classifies every path as added, modified,
//! removed or unchanged. Large deltas are not worth patching: beyond the
//! configured thresholds the scanner recommends a full rescan instead.
//!
//! ```text
//!  Idle ──► Diffing ──┬──► Patched            (patch handed to the store)
//!                     └──► RescanRecommended  (too many changes / I/O failure)
//! ```

use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::listing::FileListing;

/// Default fraction of the baseline that may change before a full rescan is
/// recommended.
pub const DEFAULT_MAX_CHANGE_RATIO: f64 = 0.25;

/// Default absolute cap on changed files for an incremental patch.
pub const DEFAULT_MAX_CHANGED_FILES: usize = 2_000;

/// Limits beyond which an incremental patch is abandoned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanThresholds {
    /// Maximum `changed / baseline` ratio.
    pub max_change_ratio: f64,

    /// Maximum number of changed files, regardless of baseline size.
    pub max_changed_files: usize,
}

impl Default for ScanThresholds {
    fn default() -> Self {
        Self {
            max_change_ratio: DEFAULT_MAX_CHANGE_RATIO,
            max_changed_files: DEFAULT_MAX_CHANGED_FILES,
        }
    }
}

impl ScanThresholds {
    /// Whether `changed` files out of `baseline` exceed the limits.
    ///
    /// No change never exceeds. Any change against an empty baseline does.
    pub fn exceeded_by(&self, changed: usize, baseline: usize) -> bool {
        if changed == 0 {
            return false;
        }
        if baseline == 0 || changed > self.max_changed_files {
            return true;
        }
        changed as f64 / baseline as f64 > self.max_change_ratio
    }
}

/// Scanner lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Diffing,
    Patched,
    RescanRecommended,
}

/// Classified filesystem delta.
///
/// When `recommend_full_rescan` is set the three path lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDiff {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub recommend_full_rescan: bool,
}

impl ScanDiff {
    /// A diff that only recommends a full rescan.
    pub fn full_rescan() -> Self {
        Self {
            recommend_full_rescan: true,
            ..Self::default()
        }
    }

    pub fn changed_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// No changes and no rescan recommendation.
    pub fn is_empty(&self) -> bool {
        !self.recommend_full_rescan && self.changed_count() == 0
    }
}

/// Classify every path of `current` against `baseline`.
///
/// Paths are unchanged when both size and modification time match. The
/// result lists are sorted by path.
pub fn diff_listings(baseline: &FileListing, current: &FileListing) -> ScanDiff {
    let mut diff = ScanDiff::default();

    for (path, file) in current.iter() {
        match baseline.get(path) {
            None => diff.added.push(path.clone()),
            Some(known) if known.stamp != file.stamp => diff.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    diff.removed = baseline
        .iter()
        .filter(|(path, _)| !current.contains(path))
        .map(|(path, _)| path.clone())
        .collect();

    diff
}

/// Stateful wrapper around [`diff_listings`] applying the rescan thresholds.
#[derive(Debug)]
pub struct IncrementalScanner {
    thresholds: ScanThresholds,
    state: ScanState,
}

impl IncrementalScanner {
    pub fn new(thresholds: ScanThresholds) -> Self {
        Self {
            thresholds,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn thresholds(&self) -> ScanThresholds {
        self.thresholds
    }

    /// Diff a listing result against the baseline.
    ///
    /// A listing error never produces a patch: it recommends a full rescan.
    pub fn diff(&mut self, baseline: &FileListing, current: io::Result<&FileListing>) -> ScanDiff {
        self.state = ScanState::Diffing;

        let current = match current {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Failed to list package files; recommending full rescan");
                self.state = ScanState::RescanRecommended;
                return ScanDiff::full_rescan();
            }
        };

        let diff = diff_listings(baseline, current);
        let changed = diff.changed_count();

        debug!(
            baseline = baseline.len(),
            current = current.len(),
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            "Classified filesystem changes"
        );

        if self.thresholds.exceeded_by(changed, baseline.len()) {
            info!(
                changed = changed,
                baseline = baseline.len(),
                max_change_ratio = self.thresholds.max_change_ratio,
                max_changed_files = self.thresholds.max_changed_files,
                "Change set too large for incremental refresh; recommending full rescan"
            );
            self.state = ScanState::RescanRecommended;
            return ScanDiff::full_rescan();
        }

        diff
    }

    /// Record that the diff's patch has been applied to the store.
    pub fn mark_patched(&mut self) {
        self.state = ScanState::Patched;
    }

    /// Return to idle, e.g. after a full rescan replaced the store.
    pub fn reset(&mut self) {
        self.state = ScanState::Idle;
    }
}

impl Default for IncrementalScanner {
    fn default() -> Self {
        Self::new(ScanThresholds::default())
    }
}
