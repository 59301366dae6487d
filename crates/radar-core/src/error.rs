//! Core error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while inspecting or rewriting the store.
#[derive(Debug, Error)]
pub enum Error {
    /// A named table or view does not exist in the catalog.
    #[error("table or view not found: {name}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// None of the candidate source tables exist.
    #[error("no source table found (tried: {})", .candidates.join(", "))]
    SourceNotFound {
        /// Names tried, in order.
        candidates: Vec<String>,
    },

    /// A table cannot be populated because required columns are missing from its source.
    #[error("cannot populate '{table}' from '{source_table}': missing required columns {missing:?}")]
    IncompatibleSchema {
        /// The table being populated.
        table: String,
        /// The table rows would be read from.
        source_table: String,
        /// Required columns absent from the source.
        missing: Vec<String>,
    },

    /// The store rejected a write because of a constraint.
    #[error("constraint violation on '{table}': {message}")]
    ConstraintViolation {
        /// The table being written.
        table: String,
        /// Message reported by the store.
        message: String,
    },

    /// A table or column name outside the accepted identifier charset.
    #[error("invalid identifier: {name:?}")]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },

    /// A rebuilt table failed its post-build check.
    #[error("validation failed for '{table}': {message}")]
    Validation {
        /// The table that was checked.
        table: String,
        /// What did not match.
        message: String,
    },

    /// Malformed caller configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// One or more tables failed during a run that continued past failures.
    #[error("{failed} of {total} table refreshes failed")]
    PartialRun {
        /// Number of failed tables.
        failed: usize,
        /// Number of tables processed.
        total: usize,
    },

    /// Any other store error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Attach the written table to a store error, promoting constraint
    /// failures to [`Error::ConstraintViolation`].
    pub fn on_table(self, table: &str) -> Self {
        match self {
            Error::Sqlite(rusqlite::Error::SqliteFailure(code, message))
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintViolation {
                    table: table.to_string(),
                    message: message.unwrap_or_else(|| code.to_string()),
                }
            }
            other => other,
        }
    }

    /// Whether this error only concerns a single table and a batch may continue past it.
    pub fn is_table_local(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::IncompatibleSchema { .. }
                | Error::ConstraintViolation { .. }
                | Error::InvalidIdentifier { .. }
                | Error::Sqlite(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_schema_lists_columns() {
        let err = Error::IncompatibleSchema {
            table: "matriz_astro_luna".to_string(),
            source_table: "astro_luna".to_string(),
            missing: vec!["signo".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("matriz_astro_luna"));
        assert!(text.contains("\"signo\""));
    }

    #[test]
    fn test_source_not_found_display() {
        let err = Error::SourceNotFound {
            candidates: vec!["astroluna".to_string(), "astro_luna".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no source table found (tried: astroluna, astro_luna)"
        );
    }

    #[test]
    fn test_constraint_failure_is_promoted() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a TEXT NOT NULL);").unwrap();
        let raw = conn
            .execute("INSERT INTO t (a) VALUES (NULL)", [])
            .unwrap_err();

        let err = Error::from(raw).on_table("t");
        match err {
            Error::ConstraintViolation { table, message } => {
                assert_eq!(table, "t");
                assert!(message.contains("NOT NULL"));
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_run_is_not_table_local() {
        let err = Error::PartialRun { failed: 1, total: 3 };
        assert!(!err.is_table_local());
        assert_eq!(err.to_string(), "1 of 3 table refreshes failed");
    }
}
