//! Idempotent index creation.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::SchemaInspector;
use crate::error::Result;
use crate::sql::{column_list, quote_ident, with_immediate_tx};

/// Column sets indexed on the matrix, with their name suffix.
const MATRIX_INDEXES: &[(&str, &[&str])] = &[
    ("fecha", &["fecha"]),
    ("numero", &["numero"]),
    ("umcdu", &["um", "c", "d", "u"]),
];

/// Columns indexed on every downstream table that declares them.
const DOWNSTREAM_INDEX: &[&str] = &["fecha", "numero"];

/// One index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
}

impl IndexSpec {
    /// Create an index definition named `idx_{table}_{suffix}`.
    pub fn new(table: &str, suffix: &str, columns: &[&str]) -> Self {
        Self {
            name: format!("idx_{}_{}", table, suffix),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// `CREATE INDEX IF NOT EXISTS` statement.
    pub fn create_sql(&self) -> Result<String> {
        Ok(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&self.name)?,
            quote_ident(&self.table)?,
            column_list(&self.columns)?
        ))
    }
}

/// Matrix indexes whose columns all exist.
pub fn matrix_indexes(inspector: &SchemaInspector<'_>, matrix: &str) -> Result<Vec<IndexSpec>> {
    let schema = inspector.schema(matrix)?;
    Ok(MATRIX_INDEXES
        .iter()
        .filter(|(_, columns)| columns.iter().all(|c| schema.has_column(c)))
        .map(|(suffix, columns)| IndexSpec::new(matrix, suffix, columns))
        .collect())
}

/// `(fecha, numero)` indexes on downstream tables declaring both columns.
///
/// The matrix, views and excluded tables are left alone.
pub fn downstream_indexes(
    inspector: &SchemaInspector<'_>,
    matrix: &str,
    excludes: &BTreeSet<String>,
) -> Result<Vec<IndexSpec>> {
    let mut specs = Vec::new();
    for object in inspector.list_objects()? {
        if object.is_view() || object.name == matrix || excludes.contains(&object.name) {
            continue;
        }
        let schema = inspector.schema(&object.name)?;
        if DOWNSTREAM_INDEX.iter().all(|c| schema.has_column(c)) {
            specs.push(IndexSpec::new(&object.name, "fecha_numero", DOWNSTREAM_INDEX));
        }
    }
    Ok(specs)
}

/// Create the matrix and downstream indexes in one transaction.
///
/// Returns every index definition considered; under dry-run nothing is created.
pub fn ensure_indexes(
    conn: &mut Connection,
    matrix: &str,
    excludes: &BTreeSet<String>,
    dry_run: bool,
) -> Result<Vec<IndexSpec>> {
    let specs = {
        let inspector = SchemaInspector::new(conn);
        let mut specs = matrix_indexes(&inspector, matrix)?;
        specs.extend(downstream_indexes(&inspector, matrix, excludes)?);
        specs
    };

    if dry_run {
        tracing::info!(indexes = specs.len(), "dry-run: indexes not created");
        return Ok(specs);
    }

    let statements = specs
        .iter()
        .map(IndexSpec::create_sql)
        .collect::<Result<Vec<_>>>()?;
    with_immediate_tx(conn, |tx| {
        for sql in &statements {
            tx.execute(sql, [])?;
        }
        Ok(())
    })?;

    tracing::info!(indexes = specs.len(), "indexes ensured");
    Ok(specs)
}
