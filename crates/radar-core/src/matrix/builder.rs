//! Matrix builder - repopulates the canonical matrix from its source table.

use rusqlite::Connection;
use serde::Serialize;

use super::config::MatrixConfig;
use super::extended;
use crate::catalog::{SchemaInspector, TableSchema};
use crate::error::{Error, Result};
use crate::maintenance::indexes;
use crate::sql::{column_list, quote_ident, with_immediate_tx};

/// How the matrix was (or would be) rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// Shared columns copied into the existing matrix.
    Projection,
    /// Extended schema built aside and swapped in.
    Extended,
}

impl std::fmt::Display for RebuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebuildMode::Projection => write!(f, "projection"),
            RebuildMode::Extended => write!(f, "extended"),
        }
    }
}

/// Outcome of a matrix rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRebuild {
    /// Rebuild mode.
    pub mode: RebuildMode,
    /// Source table the rows came from.
    pub source: String,
    /// Matrix table name.
    pub matrix: String,
    /// Columns copied from the source, in matrix order.
    pub common: Vec<String>,
    /// Required matrix columns the source lacks (non-empty only when
    /// null-tolerant mode was used).
    pub missing_required: Vec<String>,
    /// Rows in the source.
    pub source_rows: u64,
    /// Matrix rows before the rebuild; `None` when the matrix did not exist.
    pub rows_before: Option<u64>,
    /// Matrix rows after the rebuild; `None` under dry-run.
    pub rows_after: Option<u64>,
    /// Whether nothing was written.
    pub dry_run: bool,
}

/// Rebuilds the canonical matrix from one source table.
pub struct MatrixBuilder<'c> {
    conn: &'c mut Connection,
    config: MatrixConfig,
}

impl<'c> MatrixBuilder<'c> {
    /// Create a builder over an open connection.
    pub fn new(conn: &'c mut Connection, config: MatrixConfig) -> Self {
        Self { conn, config }
    }

    /// The builder configuration.
    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// First candidate source table that exists.
    ///
    /// The matrix and its staging and backup tables are never a source:
    /// rebuilding from them would empty the matrix.
    pub fn resolve_source(&self) -> Result<String> {
        let inspector = SchemaInspector::new(self.conn);
        let own = [
            self.config.matrix.clone(),
            self.config.staging_table(),
            self.config.backup_table(),
        ];
        for candidate in &self.config.source_candidates {
            if own.contains(candidate) {
                tracing::warn!(
                    source = %candidate,
                    matrix = %self.config.matrix,
                    "ignoring matrix table as source"
                );
                continue;
            }
            if inspector.table_exists(candidate)? {
                return Ok(candidate.clone());
            }
        }
        Err(Error::SourceNotFound {
            candidates: self.config.source_candidates.clone(),
        })
    }

    /// Projection rebuild: replace every matrix row with the source rows,
    /// copying the columns both tables declare.
    ///
    /// Fails with [`Error::IncompatibleSchema`] when the source lacks a
    /// required matrix column, unless `allow_nulls` is set. The matrix is
    /// untouched on any failure.
    pub fn rebuild(&mut self) -> Result<MatrixRebuild> {
        let source = self.resolve_source()?;
        let matrix = self.config.matrix.clone();

        let (plan_common, missing_required, source_rows, rows_before) = {
            let inspector = SchemaInspector::new(self.conn);
            if !inspector.table_exists(&matrix)? {
                return Err(Error::NotFound { name: matrix });
            }
            let source_schema = inspector.schema(&source)?;
            let matrix_schema = inspector.schema(&matrix)?;
            let (common, missing) = projection_columns(&matrix_schema, &source_schema);
            (
                common,
                missing,
                inspector.row_count(&source)?,
                inspector.row_count(&matrix)?,
            )
        };

        if !missing_required.is_empty() {
            if !self.config.allow_nulls {
                return Err(Error::IncompatibleSchema {
                    table: matrix,
                    source_table: source,
                    missing: missing_required,
                });
            }
            tracing::warn!(
                matrix = %matrix,
                source = %source,
                missing = ?missing_required,
                "rebuilding matrix without required columns"
            );
        }

        if plan_common.is_empty() {
            return Err(Error::IncompatibleSchema {
                table: matrix,
                source_table: source,
                missing: Vec::new(),
            });
        }

        tracing::info!(
            matrix = %matrix,
            source = %source,
            common = plan_common.len(),
            source_rows,
            rows_before,
            dry_run = self.config.dry_run,
            "rebuilding matrix by projection"
        );

        let mut outcome = MatrixRebuild {
            mode: RebuildMode::Projection,
            source,
            matrix,
            common: plan_common,
            missing_required,
            source_rows,
            rows_before: Some(rows_before),
            rows_after: None,
            dry_run: self.config.dry_run,
        };

        if self.config.dry_run {
            return Ok(outcome);
        }

        let delete_sql = format!("DELETE FROM {}", quote_ident(&outcome.matrix)?);
        let columns = column_list(&outcome.common)?;
        let insert_sql = format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
            quote_ident(&outcome.matrix)?,
            quote_ident(&outcome.source)?,
        );

        with_immediate_tx(self.conn, |tx| {
            tx.execute(&delete_sql, [])?;
            tx.execute(&insert_sql, [])?;
            Ok(())
        })
        .map_err(|e| e.on_table(&outcome.matrix))?;

        outcome.rows_after = Some(SchemaInspector::new(self.conn).row_count(&outcome.matrix)?);
        tracing::info!(
            matrix = %outcome.matrix,
            rows_after = outcome.rows_after,
            "matrix rebuilt"
        );
        Ok(outcome)
    }

    /// Extended rebuild: derive the full positional schema from the source
    /// and swap it in under the matrix name.
    ///
    /// The replacement is fully built and validated under a staging name
    /// before any rename. The renames run in the same transaction, so the
    /// matrix name always resolves to either the old or the new table.
    pub fn rebuild_extended(&mut self) -> Result<MatrixRebuild> {
        let source = self.resolve_source()?;
        let matrix = self.config.matrix.clone();
        let staging = self.config.staging_table();
        let backup = self.config.backup_table();

        let (source_schema, source_rows, rows_before) = {
            let inspector = SchemaInspector::new(self.conn);
            let source_schema = inspector.schema(&source)?;
            let source_rows = inspector.row_count(&source)?;
            let rows_before = if inspector.table_exists(&matrix)? {
                Some(inspector.row_count(&matrix)?)
            } else {
                None
            };
            (source_schema, source_rows, rows_before)
        };

        let missing_required = extended::missing_source_columns(&source_schema);
        if !missing_required.is_empty() {
            if !self.config.allow_nulls {
                return Err(Error::IncompatibleSchema {
                    table: matrix,
                    source_table: source,
                    missing: missing_required,
                });
            }
            tracing::warn!(
                matrix = %matrix,
                source = %source,
                missing = ?missing_required,
                "building extended matrix without required columns"
            );
        }

        let common = extended::PASSTHROUGH_COLUMNS
            .iter()
            .filter(|c| source_schema.has_column(c))
            .map(|c| c.to_string())
            .collect();

        tracing::info!(
            matrix = %matrix,
            source = %source,
            source_rows,
            rows_before,
            dry_run = self.config.dry_run,
            "rebuilding extended matrix"
        );

        let mut outcome = MatrixRebuild {
            mode: RebuildMode::Extended,
            source,
            matrix,
            common,
            missing_required,
            source_rows,
            rows_before,
            rows_after: None,
            dry_run: self.config.dry_run,
        };

        if self.config.dry_run {
            return Ok(outcome);
        }

        let create_sql = extended::create_table_sql(&staging)?;
        let populate_sql = extended::populate_sql(&staging, &source_schema)?;
        let count_staging = format!("SELECT COUNT(*) FROM {}", quote_ident(&staging)?);
        let drop_staging = format!("DROP TABLE IF EXISTS {}", quote_ident(&staging)?);
        let drop_backup = format!("DROP TABLE IF EXISTS {}", quote_ident(&backup)?);
        let park_old = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(&outcome.matrix)?,
            quote_ident(&backup)?
        );
        let promote_new = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(&staging)?,
            quote_ident(&outcome.matrix)?
        );
        let matrix_existed = outcome.rows_before.is_some();
        let matrix_name = outcome.matrix.clone();

        // Renames must not rewrite views that reference the matrix by name,
        // and the swap must not trip foreign keys mid-way. Both pragmas are
        // connection-level and cannot change inside a transaction.
        let foreign_keys: bool = self
            .conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        self.conn.pragma_update(None, "foreign_keys", false)?;
        self.conn.pragma_update(None, "legacy_alter_table", true)?;

        let swapped = with_immediate_tx(self.conn, |tx| {
            tx.execute(&drop_staging, [])?;
            tx.execute_batch(&create_sql)?;
            tx.execute(&populate_sql, [])?;

            let built: i64 = tx.query_row(&count_staging, [], |row| row.get(0))?;
            if built.max(0) as u64 != source_rows {
                return Err(Error::Validation {
                    table: staging.clone(),
                    message: format!("built {} rows, source has {}", built, source_rows),
                });
            }

            tx.execute(&drop_backup, [])?;
            if matrix_existed {
                tx.execute(&park_old, [])?;
            }
            tx.execute(&promote_new, [])?;
            tx.execute(&drop_backup, [])?;

            for index in indexes::matrix_indexes(&SchemaInspector::new(tx), &matrix_name)? {
                tx.execute(&index.create_sql()?, [])?;
            }
            Ok(())
        })
        .map_err(|e| e.on_table(&matrix_name));

        let restored = self
            .conn
            .pragma_update(None, "legacy_alter_table", false)
            .and_then(|_| self.conn.pragma_update(None, "foreign_keys", foreign_keys));

        swapped?;
        restored?;

        outcome.rows_after = Some(SchemaInspector::new(self.conn).row_count(&outcome.matrix)?);
        tracing::info!(
            matrix = %outcome.matrix,
            rows_after = outcome.rows_after,
            "extended matrix swapped in"
        );
        Ok(outcome)
    }
}

/// Columns to copy (matrix order) and required matrix columns the source lacks.
fn projection_columns(matrix: &TableSchema, source: &TableSchema) -> (Vec<String>, Vec<String>) {
    let common = matrix
        .columns
        .iter()
        .filter(|c| source.has_column(&c.name))
        .map(|c| c.name.clone())
        .collect();
    let missing = matrix
        .columns
        .iter()
        .filter(|c| c.is_required() && !source.has_column(&c.name))
        .map(|c| c.name.clone())
        .collect();
    (common, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnSpec;

    #[test]
    fn test_projection_columns() {
        let matrix = TableSchema::new(
            "m",
            vec![
                ColumnSpec::new("fecha").not_null(),
                ColumnSpec::new("numero").not_null(),
                ColumnSpec::new("signo").not_null(),
                ColumnSpec::new("nota"),
            ],
        );
        let source = TableSchema::new(
            "s",
            vec![ColumnSpec::new("numero"), ColumnSpec::new("fecha")],
        );

        let (common, missing) = projection_columns(&matrix, &source);
        assert_eq!(common, vec!["fecha", "numero"]);
        assert_eq!(missing, vec!["signo"]);
    }

    #[test]
    fn test_resolve_source_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE astro_luna (fecha TEXT);
             CREATE TABLE astroluna (fecha TEXT);",
        )
        .unwrap();

        let builder = MatrixBuilder::new(&mut conn, MatrixConfig::default());
        assert_eq!(builder.resolve_source().unwrap(), "astroluna");
    }

    #[test]
    fn test_resolve_source_missing() {
        let mut conn = Connection::open_in_memory().unwrap();
        let builder = MatrixBuilder::new(&mut conn, MatrixConfig::default());
        match builder.resolve_source() {
            Err(Error::SourceNotFound { candidates }) => {
                assert_eq!(candidates, vec!["astroluna", "astro_luna"]);
            }
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_matrix_is_never_its_own_source() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE matriz_astro_luna (fecha TEXT NOT NULL, numero INTEGER NOT NULL);
             INSERT INTO matriz_astro_luna VALUES ('2024-01-01', 1234), ('2024-01-02', 5678);
             CREATE TABLE matriz_astro_luna_backup (fecha TEXT, numero INTEGER);
             CREATE TABLE astro_luna (fecha TEXT, numero INTEGER);",
        )
        .unwrap();

        let config = MatrixConfig::default().with_source_candidates([
            "matriz_astro_luna",
            "matriz_astro_luna_new",
            "matriz_astro_luna_backup",
        ]);
        let mut builder = MatrixBuilder::new(&mut conn, config);
        assert!(matches!(builder.rebuild(), Err(Error::SourceNotFound { .. })));
        assert!(matches!(
            builder.rebuild_extended(),
            Err(Error::SourceNotFound { .. })
        ));

        let config = MatrixConfig::default()
            .with_source_candidates(["matriz_astro_luna", "astro_luna"]);
        let builder = MatrixBuilder::new(&mut conn, config);
        assert_eq!(builder.resolve_source().unwrap(), "astro_luna");

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM matriz_astro_luna", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
