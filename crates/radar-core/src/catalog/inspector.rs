//! Read-only catalog queries against a SQLite connection.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

use super::column::{ColumnSpec, TableSchema};
use super::object::{CatalogObject, ObjectKind};
use crate::error::{Error, Result};
use crate::sql::quote_ident;

/// Catalog reader borrowing an open connection.
///
/// All methods are pure reads. Methods taking a table name fail with
/// [`Error::NotFound`] when the name is not a table or view.
pub struct SchemaInspector<'c> {
    conn: &'c Connection,
}

impl<'c> SchemaInspector<'c> {
    /// Create an inspector over a connection (or an open transaction).
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// List user tables and views.
    ///
    /// Ordered by kind descending (views first, then tables) and then by
    /// name, so repeated runs visit objects in the same order. Internal
    /// `sqlite_*` objects are excluded.
    pub fn list_objects(&self) -> Result<Vec<CatalogObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY type DESC, name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut objects = Vec::new();
        for row in rows {
            let (name, kind) = row?;
            if let Some(kind) = ObjectKind::from_master_type(&kind) {
                objects.push(CatalogObject { name, kind });
            }
        }
        Ok(objects)
    }

    /// Kind of the named object, or `None` if it does not exist.
    pub fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master \
                 WHERE name = ?1 AND type IN ('table', 'view')",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.as_deref().and_then(ObjectKind::from_master_type))
    }

    /// Check whether a table (not a view) with this name exists.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.object_kind(name)? == Some(ObjectKind::Table))
    }

    /// Columns of a table or view in declaration order.
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        self.require(table)?;

        let mut stmt = self.conn.prepare(
            "SELECT name, \"notnull\", dflt_value IS NOT NULL, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt.query_map([table], |row| {
            Ok(ColumnSpec {
                name: row.get(0)?,
                nullable: row.get::<_, i64>(1)? == 0,
                has_default: row.get(2)?,
                is_primary_key: row.get::<_, i64>(3)? > 0,
            })
        })?;

        let columns = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Columns of a table bundled with its name.
    pub fn schema(&self, table: &str) -> Result<TableSchema> {
        Ok(TableSchema::new(table, self.columns(table)?))
    }

    /// Columns an INSERT into `table` must supply explicitly.
    pub fn required_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        Ok(self
            .columns(table)?
            .into_iter()
            .filter(ColumnSpec::is_required)
            .collect())
    }

    /// Exact row count. Used for reporting only.
    pub fn row_count(&self, table: &str) -> Result<u64> {
        self.require(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// `MAX(column)` rendered as text, or `None` for an empty table.
    pub fn max_value(&self, table: &str, column: &str) -> Result<Option<String>> {
        self.require(table)?;
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            quote_ident(column)?,
            quote_ident(table)?
        );
        let value: Value = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(value_to_text(value))
    }

    fn require(&self, name: &str) -> Result<ObjectKind> {
        self.object_kind(name)?.ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}
