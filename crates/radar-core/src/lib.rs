//! Radar Core - matrix rebuild and downstream table refresh for the
//! Astroluna SQLite store.
//!
//! The store holds one canonical wide table (the matrix) and dozens of
//! tables derived from it. This crate rebuilds the matrix from its raw
//! source and repopulates the derived tables that are column-compatible
//! with it, reporting one [`RefreshAction`] per table.
//!
//! ```no_run
//! use radar_core::{DownstreamRefresher, RefreshConfig, Store, StoreConfig};
//!
//! let mut store = Store::open(StoreConfig::new("radar_premios.db"))?;
//! let report = DownstreamRefresher::new(store.conn_mut(), RefreshConfig::default()).run()?;
//! println!("{} tables refreshed", report.refreshed());
//! # Ok::<(), radar_core::Error>(())
//! ```

pub mod catalog;
pub mod error;
pub mod maintenance;
pub mod matrix;
pub mod refresh;
pub mod sql;
pub mod store;

pub use catalog::{CatalogObject, ColumnSpec, ObjectKind, SchemaInspector, TableSchema};
pub use error::{Error, Result};
pub use matrix::{MatrixBuilder, MatrixConfig, MatrixRebuild, RebuildMode};
pub use refresh::{
    parse_fill_defaults, CoveragePolicy, DerivationRule, DownstreamRefresher, FailurePolicy,
    Reason, RefreshAction, RefreshConfig, RefreshReport, RuleRegistry, Verdict,
};
pub use store::{Store, StoreConfig};
