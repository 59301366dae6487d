//! Date normalisation for `fecha` columns.
//!
//! Scraped rows sometimes carry `DD/MM/YYYY`; everything downstream sorts
//! and compares `YYYY-MM-DD` text.

use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::SchemaInspector;
use crate::error::Result;
use crate::sql::{quote_ident, with_immediate_tx};

/// `GLOB` pattern matching a `DD/MM/YYYY` value.
const SLASHED_DATE: &str = "[0-9][0-9]/[0-9][0-9]/[0-9][0-9][0-9][0-9]";

/// Outcome for one table with a `fecha` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateNormalization {
    /// Table name.
    pub table: String,
    /// Actual name of the date column (matched case-insensitively).
    pub column: String,
    /// Rows in `DD/MM/YYYY` form before the rewrite.
    pub pending: u64,
    /// Rows rewritten; zero under dry-run.
    pub updated: u64,
    /// Store error that rolled this table back.
    pub error: Option<String>,
}

fn count_sql(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "SELECT COUNT(*) FROM {} WHERE {} GLOB '{}'",
        quote_ident(table)?,
        quote_ident(column)?,
        SLASHED_DATE
    ))
}

fn update_sql(table: &str, column: &str) -> Result<String> {
    let col = quote_ident(column)?;
    Ok(format!(
        "UPDATE {table} SET {col} = substr({col}, 7, 4) || '-' || substr({col}, 4, 2) || '-' || substr({col}, 1, 2) \
         WHERE {col} GLOB '{pattern}'",
        table = quote_ident(table)?,
        col = col,
        pattern = SLASHED_DATE
    ))
}

/// Rewrite `DD/MM/YYYY` dates to `YYYY-MM-DD` in every table with a `fecha`
/// column, one transaction per table.
///
/// A table whose update fails is rolled back and reported; the others
/// still run.
pub fn normalize_dates(conn: &mut Connection, dry_run: bool) -> Result<Vec<DateNormalization>> {
    let mut targets = Vec::new();
    {
        let inspector = SchemaInspector::new(conn);
        for object in inspector.list_objects()? {
            if object.is_view() {
                continue;
            }
            let column = inspector
                .columns(&object.name)?
                .into_iter()
                .find(|c| c.name.eq_ignore_ascii_case("fecha"));
            if let Some(column) = column {
                targets.push((object.name, column.name));
            }
        }
    }

    let mut results = Vec::with_capacity(targets.len());
    for (table, column) in targets {
        let pending: i64 = conn.query_row(&count_sql(&table, &column)?, [], |r| r.get(0))?;
        let mut outcome = DateNormalization {
            table,
            column,
            pending: pending.max(0) as u64,
            updated: 0,
            error: None,
        };

        if outcome.pending > 0 && !dry_run {
            let sql = update_sql(&outcome.table, &outcome.column)?;
            match with_immediate_tx(conn, |tx| Ok(tx.execute(&sql, [])?)) {
                Ok(updated) => outcome.updated = updated as u64,
                Err(e) => {
                    let e = e.on_table(&outcome.table);
                    tracing::warn!(table = %outcome.table, error = %e, "date normalisation rolled back");
                    outcome.error = Some(e.to_string());
                }
            }
        }

        tracing::debug!(
            table = %outcome.table,
            pending = outcome.pending,
            updated = outcome.updated,
            "dates checked"
        );
        results.push(outcome);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (Fecha TEXT, n INTEGER);
             INSERT INTO a VALUES ('05/03/2024', 1), ('2024-03-06', 2), ('5/3/2024', 3);
             CREATE TABLE b (x INTEGER);
             CREATE VIEW va AS SELECT * FROM a;",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_normalize_dates() {
        let mut conn = setup();
        let results = normalize_dates(&mut conn, false).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].column, "Fecha");
        assert_eq!(results[0].pending, 1);
        assert_eq!(results[0].updated, 1);

        let dates: Vec<String> = conn
            .prepare("SELECT Fecha FROM a ORDER BY n")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(dates, vec!["2024-03-05", "2024-03-06", "5/3/2024"]);
    }

    #[test]
    fn test_dry_run_counts_only() {
        let mut conn = setup();
        let results = normalize_dates(&mut conn, true).unwrap();
        assert_eq!(results[0].pending, 1);
        assert_eq!(results[0].updated, 0);

        let again = normalize_dates(&mut conn, true).unwrap();
        assert_eq!(again[0].pending, 1);
    }
}
