//! Per-table refresh outcomes and the run report.

use serde::{Serialize, Serializer};

use crate::catalog::ObjectKind;
use crate::error::Error;

/// Outcome class of one table in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Contents replaced from the matrix (or would be, under dry-run).
    Refreshed,
    /// Left untouched; the reason says why.
    Skipped,
    /// A write was attempted and rolled back.
    Failed,
}

impl Verdict {
    /// Lowercase label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Refreshed => "refreshed",
            Verdict::Skipped => "skipped",
            Verdict::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a table got its verdict.
///
/// Every skip names the offending columns explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Views are never written.
    View,
    /// The table is the canonical matrix itself.
    IsMatrix,
    /// The table is in the exclusion set.
    Excluded,
    /// A requested target does not exist.
    NotFound,
    /// The table name cannot be safely quoted.
    InvalidIdentifier(String),
    /// The name matches a rule pattern but its tokens are not recognised.
    UnrecognizedName,
    /// Full-coverage mode: table columns absent from the matrix.
    MissingFromMatrix(Vec<String>),
    /// Partial mode: required table columns absent from the matrix.
    MissingRequired(Vec<String>),
    /// Partial mode: no column in common with the matrix.
    NoOverlap,
    /// The matrix cannot supply columns the derivation rule filters on.
    RuleNeeds(Vec<String>),
    /// The table was (or would be) refreshed.
    Refreshed {
        /// Matrix name.
        matrix: String,
        /// Rule label.
        rule: String,
        /// Number of columns copied.
        columns: usize,
        /// Columns filled with caller-supplied defaults.
        filled: Vec<String>,
        /// Whether this is a dry-run projection.
        dry_run: bool,
    },
    /// The write failed and was rolled back.
    Failed(String),
}

fn bracketed(columns: &[String]) -> String {
    format!("[{}]", columns.join(", "))
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::View => write!(f, "view (never written)"),
            Reason::IsMatrix => write!(f, "is the source matrix"),
            Reason::Excluded => write!(f, "excluded"),
            Reason::NotFound => write!(f, "not found"),
            Reason::InvalidIdentifier(name) => write!(f, "invalid identifier: {}", name),
            Reason::UnrecognizedName => write!(f, "unrecognized rule name"),
            Reason::MissingFromMatrix(cols) => write!(
                f,
                "full-coverage: columns missing from matrix: {}",
                bracketed(cols)
            ),
            Reason::MissingRequired(cols) => {
                write!(f, "missing required columns: {}", bracketed(cols))
            }
            Reason::NoOverlap => write!(f, "no overlapping columns with matrix"),
            Reason::RuleNeeds(cols) => {
                write!(f, "matrix lacks columns needed by rule: {}", bracketed(cols))
            }
            Reason::Refreshed {
                matrix,
                rule,
                columns,
                filled,
                dry_run,
            } => {
                let verb = if *dry_run { "would refresh" } else { "refreshed" };
                write!(f, "{} from {} ({}, {} columns)", verb, matrix, rule, columns)?;
                if !filled.is_empty() {
                    write!(f, "; filled {}", bracketed(filled))?;
                }
                Ok(())
            }
            Reason::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome for one downstream table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshAction {
    /// Table or view name.
    pub table: String,
    /// Catalog kind; `None` when the name is not in the catalog.
    pub kind: Option<ObjectKind>,
    /// Outcome class.
    pub verdict: Verdict,
    /// Human-readable reason.
    pub reason: Reason,
    /// Rows before the run, when the table was inspected.
    pub rows_before: Option<u64>,
    /// Rows after the write; `None` when nothing was written.
    pub rows_after: Option<u64>,
}

impl RefreshAction {
    /// A skipped table.
    pub fn skipped(
        table: impl Into<String>,
        kind: Option<ObjectKind>,
        reason: Reason,
        rows_before: Option<u64>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            verdict: Verdict::Skipped,
            reason,
            rows_before,
            rows_after: None,
        }
    }

    /// A refreshed table. `rows_after` is `None` under dry-run.
    pub fn refreshed(
        table: impl Into<String>,
        kind: Option<ObjectKind>,
        reason: Reason,
        rows_before: Option<u64>,
        rows_after: Option<u64>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            verdict: Verdict::Refreshed,
            reason,
            rows_before,
            rows_after,
        }
    }

    /// A table whose write was rolled back.
    pub fn failed(
        table: impl Into<String>,
        kind: Option<ObjectKind>,
        error: &Error,
        rows_before: Option<u64>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            verdict: Verdict::Failed,
            reason: Reason::Failed(error.to_string()),
            rows_before,
            rows_after: None,
        }
    }
}

/// Ordered actions of one refresher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Actions in processing order.
    pub actions: Vec<RefreshAction>,
    /// Whether the run was a dry-run.
    pub dry_run: bool,
}

impl RefreshReport {
    /// Number of actions with the given verdict.
    pub fn count(&self, verdict: Verdict) -> usize {
        self.actions.iter().filter(|a| a.verdict == verdict).count()
    }

    /// Number of refreshed tables.
    pub fn refreshed(&self) -> usize {
        self.count(Verdict::Refreshed)
    }

    /// Number of skipped tables.
    pub fn skipped(&self) -> usize {
        self.count(Verdict::Skipped)
    }

    /// Number of failed tables.
    pub fn failed(&self) -> usize {
        self.count(Verdict::Failed)
    }

    /// Look up the action for a table.
    pub fn action(&self, table: &str) -> Option<&RefreshAction> {
        self.actions.iter().find(|a| a.table == table)
    }

    /// [`Error::PartialRun`] when any table failed.
    pub fn partial_run_error(&self) -> Option<Error> {
        let failed = self.failed();
        (failed > 0).then(|| Error::PartialRun {
            failed,
            total: self.actions.len(),
        })
    }
}
