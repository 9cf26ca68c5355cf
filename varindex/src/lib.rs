//! VarIndex - package index and dependency resolution for content libraries
//!
//! This library indexes a large on-disk package library (installed,
//! available, archived and externally hosted packages) and answers the
//! questions a library manager asks of it:
//!
//! - Who depends on this package? (O(1) per query)
//! - Which version does `Creator.Name.latest` point at right now?
//! - Which packages exist in more than one place?
//! - Which records pass this filter, and how many fall under each facet?
//! - What changed on disk since the last scan?
//!
//! # Architecture
//!
//! ```text
//!   ScanEntry[] ──► MetadataStore ──► Arc<StoreSnapshot> (generation N)
//!                       ▲                  │
//!                       │ apply_patch      ├──► VersionResolver ──► DependencyGraph
//!                       │                  │        (lazy, per generation)
//!   filesystem ──► IncrementalScanner      └──► FilterEngine (FilterSnapshot)
//! ```
//!
//! [`PackageIndex`] ties the pieces together and is the entry point for
//! consumers.

pub mod cancel;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod graph;
pub mod index;
pub mod logging;
pub mod manifest;
pub mod package;
pub mod resolver;
pub mod scanner;
pub mod store;

pub use cancel::{Outcome, RequestSupervisor};
pub use config::{ExternalDestination, IndexConfig, ScanRoot};
pub use error::{IndexError, IndexResult};
pub use index::{PackageIndex, PackageParser, RefreshOutcome};
pub use package::{BaseName, DependencyRef, MetadataKey, PackageRecord, PackageStatus, ScanEntry};
pub use store::{IngestReport, MetadataStore, StoreSnapshot};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
