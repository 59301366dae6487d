//! SQL text helpers: identifier quoting and transactional execution.
//!
//! Every table and column name interpolated into SQL goes through
//! [`quote_ident`], which rejects names outside a conservative charset.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Error, Result};

/// Longest identifier accepted by [`validate_ident`].
pub const MAX_IDENT_LEN: usize = 128;

/// Check that `name` only contains letters, digits and underscores.
pub fn validate_ident(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENT_LEN
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Validate and double-quote an identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    let name = validate_ident(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a list of column names and join them with `", "`.
pub fn column_list<S: AsRef<str>>(columns: &[S]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Render a string as a single-quoted SQL literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction.
///
/// The transaction commits when `f` returns `Ok`; on error it is rolled back
/// (by dropping the uncommitted transaction) and the error is returned.
pub fn with_immediate_tx<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            tracing::debug!(error = %e, "rolling back transaction");
            tx.rollback()?;
            Err(e)
        }
    }
}
