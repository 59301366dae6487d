//! Downstream table refresh.
//!
//! Decides, for every catalog object, whether it can be safely repopulated
//! from the canonical matrix and does so one transaction per table. The
//! outcome of every decision is a [`RefreshAction`].
//!
//! # Coverage policies
//!
//! | Policy | Eligible when |
//! |--------|---------------|
//! | [`CoveragePolicy::FullCoverage`] | every table column is supplied |
//! | [`CoveragePolicy::Partial`] | no required column is missing and one column overlaps |

mod action;
mod config;
pub mod eligibility;
mod refresher;
pub mod rule;

pub use action::{Reason, RefreshAction, RefreshReport, Verdict};
pub use config::{parse_fill_defaults, CoveragePolicy, FailurePolicy, RefreshConfig, DEFAULT_EXCLUDES};
pub use eligibility::ColumnPlan;
pub use refresher::DownstreamRefresher;
pub use rule::{DerivationRule, RuleKind, RuleRegistry};
