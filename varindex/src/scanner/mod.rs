//! Filesystem listing and incremental change detection.

mod diff;
mod listing;

pub use diff::{
    diff_listings, IncrementalScanner, ScanDiff, ScanState, ScanThresholds,
    DEFAULT_MAX_CHANGED_FILES, DEFAULT_MAX_CHANGE_RATIO,
};
pub use listing::{list_roots, FileListing, FileStamp, ListedFile};
