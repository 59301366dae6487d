//! Canonical matrix rebuild.
//!
//! The matrix is the single wide table every downstream table is refreshed
//! from. It can be rebuilt two ways:
//!
//! | Mode | Schema | Write |
//! |------|--------|-------|
//! | Projection | the matrix keeps its declared columns | `DELETE` + `INSERT … SELECT` of shared columns |
//! | Extended | fixed schema with positional digits and one-hot flags | build `{matrix}_new`, then rename swap |
//!
//! Both modes share the read path with dry-run: counts and column diffs
//! are computed, and only the write is skipped.

mod builder;
mod config;
pub mod digits;
mod extended;

pub use builder::{MatrixBuilder, MatrixRebuild, RebuildMode};
pub use config::{MatrixConfig, DEFAULT_MATRIX, DEFAULT_SOURCE_CANDIDATES};
pub use digits::Position;
pub use extended::{extended_columns, ExtendedColumn};
