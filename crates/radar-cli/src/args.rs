//! Command-line arguments and their conversion into core configuration.

use std::path::PathBuf;

use clap::Parser;
use radar_core::matrix::{DEFAULT_MATRIX, DEFAULT_SOURCE_CANDIDATES};
use radar_core::{
    parse_fill_defaults, FailurePolicy, MatrixConfig, RefreshConfig, RuleRegistry, StoreConfig,
};

use crate::formatter::OutputFormat;

/// Default database file.
pub const DEFAULT_DB: &str = "radar_premios.db";

/// Radar matrix and downstream refresh tool.
#[derive(Parser, Debug)]
#[command(name = "radar")]
#[command(
    version,
    about = "Rebuild the Astroluna matrix and refresh the tables derived from it",
    long_about = None
)]
pub struct Args {
    /// Path to the SQLite database. The file must already exist.
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,

    /// Compute every step without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Only refresh these tables.
    #[arg(long, num_args = 1..)]
    pub targets: Vec<String>,

    /// Extra tables never refreshed, added to the defaults.
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Write the per-table report to this CSV file.
    #[arg(long, visible_alias = "reporte")]
    pub report: Option<PathBuf>,

    /// Run VACUUM and PRAGMA optimize at the end (skipped under --dry-run).
    #[arg(long)]
    pub vacuum: bool,

    /// Refresh tables that have columns the matrix lacks, as long as
    /// their required columns are covered.
    #[arg(long)]
    pub allow_partial: bool,

    /// Values for columns absent from the matrix, as `column=value`.
    #[arg(long, num_args = 1.., value_name = "COLUMN=VALUE")]
    pub fill_defaults: Vec<String>,

    /// Name of the canonical matrix table.
    #[arg(long, default_value = DEFAULT_MATRIX)]
    pub matrix: String,

    /// Candidate source tables for the matrix rebuild, first existing wins.
    #[arg(long, num_args = 1..)]
    pub source: Vec<String>,

    /// Rebuild the matrix from its source before refreshing.
    #[arg(long)]
    pub rebuild_matrix: bool,

    /// Rebuild the matrix with the full positional schema (implies
    /// --rebuild-matrix).
    #[arg(long)]
    pub extended_matrix: bool,

    /// Rebuild the matrix even when the source lacks required columns.
    #[arg(long)]
    pub allow_null_matrix: bool,

    /// Drop and recreate the matrix view.
    #[arg(long)]
    pub recreate_view: bool,

    /// Create the matrix and downstream indexes if missing.
    #[arg(long)]
    pub ensure_indexes: bool,

    /// Rewrite DD/MM/YYYY dates to YYYY-MM-DD before anything else.
    #[arg(long)]
    pub normalize_dates: bool,

    /// Print row counts and latest dates of key objects at the end.
    #[arg(long)]
    pub verify: bool,

    /// Disable the derivation rules; every table is a plain projection.
    #[arg(long)]
    pub projection_only: bool,

    /// Stop at the first table whose refresh fails.
    #[arg(long)]
    pub fail_fast: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

impl Args {
    /// Whether any matrix rebuild was requested.
    pub fn rebuilds_matrix(&self) -> bool {
        self.rebuild_matrix || self.extended_matrix
    }

    /// Store configuration. The CLI never creates a database.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.db)
    }

    /// Matrix builder configuration.
    pub fn matrix_config(&self) -> MatrixConfig {
        let config = MatrixConfig::default()
            .with_matrix(&self.matrix)
            .allow_nulls(self.allow_null_matrix)
            .dry_run(self.dry_run);

        if self.source.is_empty() {
            config.with_source_candidates(DEFAULT_SOURCE_CANDIDATES.iter().copied())
        } else {
            config.with_source_candidates(self.source.iter())
        }
    }

    /// Refresher configuration.
    pub fn refresh_config(&self) -> radar_core::Result<RefreshConfig> {
        let failure_policy = if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        };
        let rules = if self.projection_only {
            RuleRegistry::projection_only()
        } else {
            RuleRegistry::builtin()
        };

        Ok(RefreshConfig::default()
            .with_matrix(&self.matrix)
            .allow_partial(self.allow_partial)
            .with_excludes(self.exclude.iter())
            .with_targets(self.targets.iter())
            .with_fill_defaults(parse_fill_defaults(&self.fill_defaults)?)
            .with_failure_policy(failure_policy)
            .with_rules(rules)
            .dry_run(self.dry_run))
    }
}
