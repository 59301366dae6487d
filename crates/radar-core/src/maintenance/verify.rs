//! Post-run verification of key objects.

use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::{ObjectKind, SchemaInspector};
use crate::error::{Error, Result};

/// Date column whose maximum is reported.
const DATE_COLUMN: &str = "fecha";

/// Objects verified when the caller names none: the source, the matrix,
/// the full summary table and the matrix view.
pub fn default_verify_targets(source: Option<&str>, matrix: &str) -> Vec<String> {
    let mut names: Vec<String> = source.into_iter().map(str::to_string).collect();
    names.push(matrix.to_string());
    names.push("todos_resumen_matriz_aslu".to_string());
    names.push(super::views::DEFAULT_VIEW.to_string());
    names
}

/// Counts for one verified object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Object name.
    pub name: String,
    /// Catalog kind; `None` when missing.
    pub kind: Option<ObjectKind>,
    /// `COUNT(*)`.
    pub rows: Option<u64>,
    /// `MAX(fecha)` when the object has that column.
    pub max_date: Option<String>,
    /// Store error raised while counting (e.g. a view over a dropped table).
    pub error: Option<String>,
}

impl Verification {
    /// Whether the object exists and could be counted.
    pub fn is_ok(&self) -> bool {
        self.kind.is_some() && self.error.is_none()
    }

    /// One-line summary.
    pub fn detail(&self) -> String {
        match (&self.kind, &self.error) {
            (None, _) => "not found".to_string(),
            (Some(_), Some(e)) => format!("error: {}", e),
            (Some(_), None) => {
                let mut detail = format!("COUNT={}", self.rows.unwrap_or(0));
                if let Some(date) = &self.max_date {
                    detail.push_str(&format!(" | MAX(fecha)={}", date));
                }
                detail
            }
        }
    }
}

fn inspect(inspector: &SchemaInspector<'_>, name: &str) -> Result<(u64, Option<String>)> {
    let rows = inspector.row_count(name)?;
    let max_date = if inspector.columns(name)?.iter().any(|c| c.name == DATE_COLUMN) {
        inspector.max_value(name, DATE_COLUMN)?
    } else {
        None
    };
    Ok((rows, max_date))
}

/// Count rows and report the latest date of each named object.
///
/// Store errors on an individual object are recorded, not propagated.
pub fn verify<S: AsRef<str>>(conn: &Connection, names: &[S]) -> Result<Vec<Verification>> {
    let inspector = SchemaInspector::new(conn);
    let mut results = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref();
        let mut verification = Verification {
            name: name.to_string(),
            kind: inspector.object_kind(name)?,
            rows: None,
            max_date: None,
            error: None,
        };

        if verification.kind.is_some() {
            match inspect(&inspector, name) {
                Ok((rows, max_date)) => {
                    verification.rows = Some(rows);
                    verification.max_date = max_date;
                }
                Err(e @ (Error::Sqlite(_) | Error::InvalidIdentifier { .. })) => {
                    verification.error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            name = %verification.name,
            detail = %verification.detail(),
            "verified"
        );
        results.push(verification);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_mixed_objects() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE m (fecha TEXT, numero INTEGER);
             INSERT INTO m VALUES ('2024-02-01', 1), ('2024-03-01', 2);
             CREATE TABLE sin_fecha (x INTEGER);
             CREATE VIEW todo AS SELECT * FROM m;
             CREATE TABLE gone (a INTEGER);
             CREATE VIEW roto AS SELECT a FROM gone;
             DROP TABLE gone;",
        )
        .unwrap();

        let results = verify(&conn, &["m", "sin_fecha", "todo", "roto", "nada"]).unwrap();

        assert_eq!(results[0].detail(), "COUNT=2 | MAX(fecha)=2024-03-01");
        assert_eq!(results[1].detail(), "COUNT=0");
        assert_eq!(results[2].kind, Some(ObjectKind::View));
        assert_eq!(results[2].rows, Some(2));
        assert!(results[3].error.is_some());
        assert!(!results[3].is_ok());
        assert_eq!(results[4].detail(), "not found");
    }

    #[test]
    fn test_default_targets() {
        assert_eq!(
            default_verify_targets(Some("astro_luna"), "matriz_astro_luna"),
            vec!["astro_luna", "matriz_astro_luna", "todos_resumen_matriz_aslu", "todo"]
        );
        assert_eq!(default_verify_targets(None, "m").len(), 3);
    }
}
