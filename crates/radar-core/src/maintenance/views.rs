//! Convenience view over the matrix.

use rusqlite::Connection;

use crate::catalog::{ObjectKind, SchemaInspector};
use crate::error::{Error, Result};
use crate::sql::{quote_ident, with_immediate_tx};

/// Name of the `SELECT *` view over the matrix.
pub const DEFAULT_VIEW: &str = "todo";

/// Drop and recreate `view` as `SELECT * FROM matrix` in one transaction.
///
/// Fails with [`Error::NotFound`] when the matrix is missing and refuses to
/// replace a table that happens to carry the view's name.
pub fn recreate_view(conn: &mut Connection, view: &str, matrix: &str, dry_run: bool) -> Result<()> {
    {
        let inspector = SchemaInspector::new(conn);
        if !inspector.table_exists(matrix)? {
            return Err(Error::NotFound {
                name: matrix.to_string(),
            });
        }
        if inspector.object_kind(view)? == Some(ObjectKind::Table) {
            return Err(Error::InvalidConfig(format!(
                "'{}' is a table, not a view",
                view
            )));
        }
    }

    let drop_sql = format!("DROP VIEW IF EXISTS {}", quote_ident(view)?);
    let create_sql = format!(
        "CREATE VIEW {} AS SELECT * FROM {}",
        quote_ident(view)?,
        quote_ident(matrix)?
    );

    if dry_run {
        tracing::info!(view = %view, matrix = %matrix, "dry-run: view not recreated");
        return Ok(());
    }

    with_immediate_tx(conn, |tx| {
        tx.execute(&drop_sql, [])?;
        tx.execute(&create_sql, [])?;
        Ok(())
    })?;

    tracing::info!(view = %view, matrix = %matrix, "view recreated");
    Ok(())
}
