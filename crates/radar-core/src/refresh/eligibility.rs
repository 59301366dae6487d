//! Column-compatibility check between a downstream table and the matrix.
//!
//! Pure functions: no store access. The refresher computes which columns
//! the matrix can supply and asks [`evaluate`] for a verdict.

use serde::Serialize;

use super::action::Reason;
use super::config::CoveragePolicy;
use crate::catalog::TableSchema;

/// How a target table's columns line up with what the matrix supplies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    /// Target columns the matrix supplies, in target declaration order.
    pub common: Vec<String>,
    /// Target columns the matrix cannot supply.
    pub absent: Vec<String>,
    /// Subset of `absent` that an insert must supply explicitly.
    pub missing_required: Vec<String>,
}

/// Split `target`'s columns by whether `supplies` can provide them.
pub fn plan_columns<F>(target: &TableSchema, supplies: F) -> ColumnPlan
where
    F: Fn(&str) -> bool,
{
    let mut plan = ColumnPlan::default();
    for column in &target.columns {
        if supplies(&column.name) {
            plan.common.push(column.name.clone());
        } else {
            plan.absent.push(column.name.clone());
            if column.is_required() {
                plan.missing_required.push(column.name.clone());
            }
        }
    }
    plan
}

/// Apply a coverage policy to a column plan.
///
/// Full coverage demands that every target column is supplied. Partial
/// coverage demands only that no required column is absent and that at
/// least one column overlaps. Anything eligible under full coverage is
/// therefore eligible under partial coverage.
pub fn evaluate(plan: &ColumnPlan, policy: CoveragePolicy) -> Result<(), Reason> {
    match policy {
        CoveragePolicy::FullCoverage => {
            if !plan.absent.is_empty() {
                return Err(Reason::MissingFromMatrix(plan.absent.clone()));
            }
            if plan.common.is_empty() {
                return Err(Reason::NoOverlap);
            }
        }
        CoveragePolicy::Partial => {
            if !plan.missing_required.is_empty() {
                return Err(Reason::MissingRequired(plan.missing_required.clone()));
            }
            if plan.common.is_empty() {
                return Err(Reason::NoOverlap);
            }
        }
    }
    Ok(())
}
