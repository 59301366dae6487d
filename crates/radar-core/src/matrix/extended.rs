//! Extended matrix schema.
//!
//! The extended matrix carries, for every draw, the raw `fecha`/`numero`/
//! `signo`, the four positional digits, provenance columns, the
//! `um-c-d-u` combination and forty one-hot flags.

use super::digits::{self, Position, COMBINATION_COLUMN, NUMBER_COLUMN};
use crate::catalog::TableSchema;
use crate::error::Result;
use crate::sql::{column_list, quote_ident, quote_literal};

/// Columns copied verbatim from the source when present.
pub const PASSTHROUGH_COLUMNS: &[&str] = &["fecha", NUMBER_COLUMN, "signo"];

/// Value written into the `origen` column.
pub const ORIGIN_LABEL: &str = "matriz";

/// One column of the extended matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedColumn {
    /// Column name.
    pub name: String,
    /// Declared SQL type.
    pub sql_type: &'static str,
    /// Whether the column is declared NOT NULL.
    pub not_null: bool,
}

impl ExtendedColumn {
    fn new(name: impl Into<String>, sql_type: &'static str, not_null: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null,
        }
    }

    /// Column definition for `CREATE TABLE`.
    fn definition(&self) -> Result<String> {
        let mut def = format!("{} {}", quote_ident(&self.name)?, self.sql_type);
        if self.not_null {
            def.push_str(" NOT NULL");
        }
        Ok(def)
    }
}

/// The extended matrix columns in declaration order.
pub fn extended_columns() -> Vec<ExtendedColumn> {
    let mut columns = vec![
        ExtendedColumn::new("fecha", "TEXT", true),
        ExtendedColumn::new(NUMBER_COLUMN, "INTEGER", true),
        ExtendedColumn::new("signo", "TEXT", false),
    ];
    columns.extend(
        Position::ALL
            .iter()
            .map(|p| ExtendedColumn::new(p.column(), "INTEGER", true)),
    );
    columns.push(ExtendedColumn::new("origen", "TEXT", true));
    columns.push(ExtendedColumn::new("origen_tabla", "TEXT", true));
    columns.push(ExtendedColumn::new(COMBINATION_COLUMN, "TEXT", true));
    columns.extend(
        digits::flag_columns()
            .into_iter()
            .map(|name| ExtendedColumn::new(name, "INTEGER", true)),
    );
    columns
}

/// Source columns the extended rebuild needs but `source` lacks.
///
/// `signo` is nullable in the extended schema and never reported.
pub fn missing_source_columns(source: &TableSchema) -> Vec<String> {
    extended_columns()
        .into_iter()
        .filter(|c| c.not_null && PASSTHROUGH_COLUMNS.contains(&c.name.as_str()))
        .filter(|c| !source.has_column(&c.name))
        .map(|c| c.name)
        .collect()
}

/// `CREATE TABLE` statement for the extended schema.
pub fn create_table_sql(table: &str) -> Result<String> {
    let definitions = extended_columns()
        .iter()
        .map(ExtendedColumn::definition)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_ident(table)?,
        definitions.join(",\n  ")
    ))
}

/// `INSERT … SELECT` filling `table` from `source`.
///
/// Pass-through columns absent from the source are selected as NULL, so a
/// missing NOT NULL column surfaces as a constraint violation.
pub fn populate_sql(table: &str, source: &TableSchema) -> Result<String> {
    let columns = extended_columns();
    let number = if source.has_column(NUMBER_COLUMN) {
        quote_ident(NUMBER_COLUMN)?
    } else {
        "NULL".to_string()
    };

    let mut exprs = Vec::with_capacity(columns.len());
    for column in &columns {
        let name = column.name.as_str();
        let expr = if PASSTHROUGH_COLUMNS.contains(&name) {
            if source.has_column(name) {
                quote_ident(name)?
            } else {
                "NULL".to_string()
            }
        } else if name == "origen" {
            quote_literal(ORIGIN_LABEL)
        } else if name == "origen_tabla" {
            quote_literal(&source.name)
        } else {
            // Every remaining column is a digit, flag or combination column.
            digits::derived_expr(name, &number).unwrap_or_else(|| "NULL".to_string())
        };
        exprs.push(expr);
    }

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    Ok(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        quote_ident(table)?,
        column_list(&names)?,
        exprs.join(", "),
        quote_ident(&source.name)?
    ))
}
