//! Multi-criterion filtering over store snapshots.
//!
//! A UI edits a [`FilterState`]; each query captures it into an immutable
//! [`FilterSnapshot`] and hands that to the [`FilterEngine`], which evaluates
//! it over a record slice in parallel partitions. The snapshot is never
//! mutated during evaluation, so a query racing a selection change sees one
//! consistent selection.
//!
//! Criteria are a tagged [`FilterCriterion`]:
//!
//! | Variant    | Tests                                              |
//! |------------|----------------------------------------------------|
//! | `OneOf`    | a [`Facet`] label is in a set                      |
//! | `Range`    | a [`RangeField`] lies in an inclusive range        |
//! | `Flag`     | a [`RecordFlag`] has the expected value            |
//! | `Contains` | case-insensitive text over key, creator, name, file |

mod criterion;
mod engine;
mod snapshot;

pub use criterion::{
    Facet, FilterCriterion, RangeField, RecordFlag, UNCATEGORIZED_LABEL, UNLICENSED_LABEL,
};
pub use engine::FilterEngine;
pub use snapshot::{FilterSnapshot, FilterState, OriginSelection};
