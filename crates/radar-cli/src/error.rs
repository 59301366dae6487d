//! CLI errors.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors of a `radar` run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The database file does not exist; the CLI never creates one.
    #[error("cannot open database {}: file not found", .0.display())]
    DatabaseNotFound(PathBuf),

    /// Error from the core library.
    #[error("{0}")]
    Core(#[from] radar_core::Error),

    /// Report file could not be written.
    #[error("report error: {0}")]
    Report(#[from] csv::Error),
}
