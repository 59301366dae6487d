//! Run pipeline: optional maintenance around one downstream refresh.

use radar_core::maintenance::{
    self, default_verify_targets, DateNormalization, IndexSpec, Verification, DEFAULT_VIEW,
};
use radar_core::{DownstreamRefresher, Error, MatrixBuilder, MatrixRebuild, RefreshReport, Store};
use serde::Serialize;

use crate::args::Args;
use crate::error::CliError;

/// Everything one run produced, in execution order.
#[derive(Debug, Default, Serialize)]
pub struct RunOutcome {
    /// Date normalisation, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<DateNormalization>>,
    /// Matrix rebuild, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<MatrixRebuild>,
    /// Name of the recreated view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Downstream refresh report.
    pub report: RefreshReport,
    /// Indexes ensured after the refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<IndexSpec>>,
    /// Verification of key objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Vec<Verification>>,
    /// Whether VACUUM and PRAGMA optimize ran.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub compacted: bool,
}

/// Execute the steps selected by `args` against the database.
///
/// Order: dates, matrix rebuild, view, refresh, indexes, verification,
/// compaction. Any fatal error stops the run; failed table refreshes are
/// only recorded in the report.
pub fn execute(args: &Args) -> Result<RunOutcome, CliError> {
    if !args.db.is_file() {
        return Err(CliError::DatabaseNotFound(args.db.clone()));
    }
    let refresh_config = args.refresh_config()?;
    let excludes = refresh_config.excludes.clone();

    let mut store = Store::open(args.store_config())?;
    tracing::info!(
        db = %args.db.display(),
        matrix = %args.matrix,
        dry_run = args.dry_run,
        "database opened"
    );

    let mut outcome = RunOutcome::default();

    if args.normalize_dates {
        outcome.dates = Some(maintenance::normalize_dates(store.conn_mut(), args.dry_run)?);
    }

    if args.rebuilds_matrix() {
        let mut builder = MatrixBuilder::new(store.conn_mut(), args.matrix_config());
        let rebuild = if args.extended_matrix {
            builder.rebuild_extended()?
        } else {
            builder.rebuild()?
        };
        outcome.rebuild = Some(rebuild);
    }

    if args.recreate_view {
        maintenance::recreate_view(store.conn_mut(), DEFAULT_VIEW, &args.matrix, args.dry_run)?;
        outcome.view = Some(DEFAULT_VIEW.to_string());
    }

    outcome.report = DownstreamRefresher::new(store.conn_mut(), refresh_config).run()?;

    if args.ensure_indexes {
        outcome.indexes = Some(maintenance::ensure_indexes(
            store.conn_mut(),
            &args.matrix,
            &excludes,
            args.dry_run,
        )?);
    }

    if args.verify {
        let source = match &outcome.rebuild {
            Some(rebuild) => Some(rebuild.source.clone()),
            None => resolve_source(&mut store, args)?,
        };
        let names = default_verify_targets(source.as_deref(), &args.matrix);
        outcome.verification = Some(maintenance::verify(store.conn(), &names)?);
    }

    if args.vacuum && !args.dry_run {
        maintenance::vacuum(store.conn())?;
        maintenance::optimize(store.conn())?;
        outcome.compacted = true;
    }

    store.close()?;
    Ok(outcome)
}

/// Source table for verification; absent sources are not an error here.
fn resolve_source(store: &mut Store, args: &Args) -> Result<Option<String>, CliError> {
    match MatrixBuilder::new(store.conn_mut(), args.matrix_config()).resolve_source() {
        Ok(source) => Ok(Some(source)),
        Err(Error::SourceNotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
