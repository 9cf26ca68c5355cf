//! CLI command implementations.

pub mod common;
pub mod filter;
pub mod query;
pub mod refresh;
pub mod summary;
