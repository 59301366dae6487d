//! Downstream refresher - repopulates derived tables from the matrix.
//!
//! Each candidate goes through the same decision sequence:
//!
//! 1. views are skipped
//! 2. the matrix and excluded tables are skipped
//! 3. tables outside a non-empty target list are left out of the report
//! 4. the derivation rule is resolved from the table name
//! 5. the coverage policy decides eligibility
//! 6. eligible tables are replaced in their own `IMMEDIATE` transaction
//!
//! Objects are visited in catalog order so repeated runs report the same
//! tables in the same order.

use std::collections::BTreeMap;

use rusqlite::Connection;

use super::action::{Reason, RefreshAction, RefreshReport};
use super::config::{CoveragePolicy, FailurePolicy, RefreshConfig};
use super::eligibility::{evaluate, plan_columns, ColumnPlan};
use super::rule::{ColumnResolver, DerivationRule};
use crate::catalog::{CatalogObject, ObjectKind, SchemaInspector, TableSchema};
use crate::error::{Error, Result};
use crate::sql::{quote_ident, validate_ident, with_immediate_tx};

/// A table that passed every check and is ready to be written.
struct RefreshPlan {
    table: String,
    rule: DerivationRule,
    columns: ColumnPlan,
    fills: Vec<(String, String)>,
    insert_sql: String,
    rows_before: u64,
}

/// Refreshes every eligible downstream table from the canonical matrix.
pub struct DownstreamRefresher<'c> {
    conn: &'c mut Connection,
    config: RefreshConfig,
}

impl<'c> DownstreamRefresher<'c> {
    /// Create a refresher over an open connection.
    pub fn new(conn: &'c mut Connection, config: RefreshConfig) -> Self {
        Self { conn, config }
    }

    /// The refresher configuration.
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Visit every catalog object and refresh the eligible ones.
    ///
    /// Fails before touching any table when the matrix is missing. Catalog
    /// reads propagate; write failures are handled per [`FailurePolicy`].
    pub fn run(&mut self) -> Result<RefreshReport> {
        let (matrix, objects) = {
            let inspector = SchemaInspector::new(self.conn);
            validate_ident(&self.config.matrix)?;
            if !inspector.table_exists(&self.config.matrix)? {
                return Err(Error::NotFound {
                    name: self.config.matrix.clone(),
                });
            }
            (inspector.schema(&self.config.matrix)?, inspector.list_objects()?)
        };

        tracing::info!(
            matrix = %matrix.name,
            objects = objects.len(),
            coverage = ?self.config.coverage,
            dry_run = self.config.dry_run,
            "starting downstream refresh"
        );

        let mut report = RefreshReport {
            actions: Vec::new(),
            dry_run: self.config.dry_run,
        };

        for object in &objects {
            if let Some(action) = self.visit(object, &matrix)? {
                log_action(&action);
                report.actions.push(action);
            }
        }

        for target in &self.config.targets {
            if !objects.iter().any(|o| &o.name == target) {
                let action = RefreshAction::skipped(target.clone(), None, Reason::NotFound, None);
                log_action(&action);
                report.actions.push(action);
            }
        }

        tracing::info!(
            refreshed = report.refreshed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "downstream refresh finished"
        );
        Ok(report)
    }

    /// Decide and apply one object. `None` means the object is not reported.
    fn visit(
        &mut self,
        object: &CatalogObject,
        matrix: &TableSchema,
    ) -> Result<Option<RefreshAction>> {
        let kind = Some(object.kind);
        let name = object.name.as_str();

        if object.is_view() {
            return Ok(Some(RefreshAction::skipped(name, kind, Reason::View, None)));
        }
        if name == matrix.name {
            return Ok(Some(RefreshAction::skipped(name, kind, Reason::IsMatrix, None)));
        }
        if self.config.is_excluded(name) {
            return Ok(Some(RefreshAction::skipped(name, kind, Reason::Excluded, None)));
        }
        if !self.config.is_targeted(name) {
            return Ok(None);
        }
        if validate_ident(name).is_err() {
            let reason = Reason::InvalidIdentifier(name.to_string());
            return Ok(Some(RefreshAction::skipped(name, kind, reason, None)));
        }

        let plan = match self.plan(name, matrix)? {
            Ok(plan) => plan,
            Err((reason, rows_before)) => {
                return Ok(Some(RefreshAction::skipped(name, kind, reason, Some(rows_before))));
            }
        };

        let reason = Reason::Refreshed {
            matrix: matrix.name.clone(),
            rule: plan.rule.to_string(),
            columns: plan.columns.common.len(),
            filled: plan.fills.iter().map(|(c, _)| c.clone()).collect(),
            dry_run: self.config.dry_run,
        };

        if self.config.dry_run {
            return Ok(Some(RefreshAction::refreshed(
                name,
                kind,
                reason,
                Some(plan.rows_before),
                None,
            )));
        }

        match self.apply(&plan) {
            Ok(rows_after) => Ok(Some(RefreshAction::refreshed(
                name,
                kind,
                reason,
                Some(plan.rows_before),
                Some(rows_after),
            ))),
            Err(e) if self.config.failure_policy == FailurePolicy::Continue && e.is_table_local() => {
                tracing::warn!(table = %name, error = %e, "refresh failed, continuing");
                Ok(Some(RefreshAction::failed(name, kind, &e, Some(plan.rows_before))))
            }
            Err(e) => Err(e),
        }
    }

    /// Read-side checks for one table. The inner `Err` is a skip with its
    /// reason and the current row count.
    fn plan(
        &self,
        table: &str,
        matrix: &TableSchema,
    ) -> Result<std::result::Result<RefreshPlan, (Reason, u64)>> {
        let inspector = SchemaInspector::new(self.conn);
        let target = inspector.schema(table)?;
        let rows_before = inspector.row_count(table)?;

        let rule = match self.config.rules.resolve(table) {
            Some(rule) => rule,
            None => return Ok(Err((Reason::UnrecognizedName, rows_before))),
        };

        let resolver = ColumnResolver::new(matrix, &rule);
        let missing_positions = resolver.missing_positions();
        if !missing_positions.is_empty() {
            return Ok(Err((Reason::RuleNeeds(missing_positions), rows_before)));
        }

        let columns = plan_columns(&target, |c| resolver.supplies(c));
        if let Err(reason) = evaluate(&columns, self.config.coverage) {
            return Ok(Err((reason, rows_before)));
        }

        let fills = fill_values(&columns, &self.config.fill_defaults, self.config.coverage);

        // Column names end up quoted in SQL; a bad one skips this table only.
        let mut written = columns.common.iter().chain(fills.iter().map(|(c, _)| c));
        if let Some(column) = written.find(|c| validate_ident(c).is_err()) {
            return Ok(Err((Reason::InvalidIdentifier(column.clone()), rows_before)));
        }

        let insert_sql = resolver.insert_sql(table, &columns.common)?;

        tracing::debug!(
            table = %table,
            rule = %rule,
            common = ?columns.common,
            absent = ?columns.absent,
            "table eligible"
        );

        Ok(Ok(RefreshPlan {
            table: table.to_string(),
            rule,
            columns,
            fills,
            insert_sql,
            rows_before,
        }))
    }

    /// Replace the table's rows and return the new row count.
    fn apply(&mut self, plan: &RefreshPlan) -> Result<u64> {
        let table = quote_ident(&plan.table)?;
        let delete_sql = format!("DELETE FROM {}", table);
        let fill_sql = plan
            .fills
            .iter()
            .map(|(column, value)| {
                Ok((format!("UPDATE {} SET {} = ?1", table, quote_ident(column)?), value))
            })
            .collect::<Result<Vec<_>>>()?;

        with_immediate_tx(self.conn, |tx| {
            tx.execute(&delete_sql, [])?;
            tx.execute(&plan.insert_sql, [])?;
            for (sql, value) in &fill_sql {
                tx.execute(sql, [value])?;
            }
            Ok(())
        })
        .map_err(|e| e.on_table(&plan.table))?;

        SchemaInspector::new(self.conn).row_count(&plan.table)
    }
}

/// Fill-default values that apply to a plan.
///
/// Only columns the matrix cannot supply are filled, and only in partial
/// mode; full coverage leaves no such column.
fn fill_values(
    plan: &ColumnPlan,
    defaults: &BTreeMap<String, String>,
    coverage: CoveragePolicy,
) -> Vec<(String, String)> {
    if coverage != CoveragePolicy::Partial {
        return Vec::new();
    }
    plan.absent
        .iter()
        .filter_map(|column| defaults.get(column).map(|v| (column.clone(), v.clone())))
        .collect()
}

fn log_action(action: &RefreshAction) {
    tracing::info!(
        table = %action.table,
        kind = action.kind.as_ref().map(ObjectKind::as_str).unwrap_or("-"),
        verdict = %action.verdict,
        reason = %action.reason,
        rows_before = ?action.rows_before,
        rows_after = ?action.rows_after,
        "table processed"
    );
}
