//! Downstream refresher configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::rule::RuleRegistry;
use crate::error::{Error, Result};
use crate::matrix::DEFAULT_MATRIX;
use crate::sql::validate_ident;

/// Tables never written by the refresher: raw sources and unrelated lotteries.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "astroluna",
    "astro_luna",
    "tolima",
    "huila",
    "manizales",
    "quindio",
    "medellin",
    "boyaca",
    "baloto_premios",
    "baloto_resultados",
    "revancha_premios",
    "revancha_resultados",
];

/// Which downstream tables are eligible for a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Every table column must be supplied by the matrix.
    #[default]
    FullCoverage,
    /// Required columns must be supplied and at least one column must overlap.
    Partial,
}

/// What happens when one table's write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Roll back, record the failure and continue with the next table.
    #[default]
    Continue,
    /// Roll back and return the error.
    Abort,
}

/// Configuration for [`DownstreamRefresher`](super::DownstreamRefresher).
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Canonical matrix name.
    pub matrix: String,
    /// Eligibility policy.
    pub coverage: CoveragePolicy,
    /// Tables that are never written.
    pub excludes: BTreeSet<String>,
    /// When non-empty, only these tables are considered.
    pub targets: Vec<String>,
    /// Literal values for target columns the matrix cannot supply
    /// (partial coverage only).
    pub fill_defaults: BTreeMap<String, String>,
    /// Per-table failure handling.
    pub failure_policy: FailurePolicy,
    /// Table-name derivation rules.
    pub rules: RuleRegistry,
    /// Compute actions without writing.
    pub dry_run: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            matrix: DEFAULT_MATRIX.to_string(),
            coverage: CoveragePolicy::default(),
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            targets: Vec::new(),
            fill_defaults: BTreeMap::new(),
            failure_policy: FailurePolicy::default(),
            rules: RuleRegistry::default(),
            dry_run: false,
        }
    }
}

impl RefreshConfig {
    /// Set the matrix name.
    pub fn with_matrix(mut self, matrix: impl Into<String>) -> Self {
        self.matrix = matrix.into();
        self
    }

    /// Set the coverage policy.
    pub fn with_coverage(mut self, coverage: CoveragePolicy) -> Self {
        self.coverage = coverage;
        self
    }

    /// Shorthand for [`CoveragePolicy::Partial`] when `allow` is true.
    pub fn allow_partial(self, allow: bool) -> Self {
        self.with_coverage(if allow {
            CoveragePolicy::Partial
        } else {
            CoveragePolicy::FullCoverage
        })
    }

    /// Add names to the exclusion set. The defaults are kept.
    pub fn with_excludes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replace the exclusion set entirely.
    pub fn with_exclusion_set(mut self, excludes: BTreeSet<String>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Restrict the run to these tables.
    pub fn with_targets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set fill-default values.
    pub fn with_fill_defaults(mut self, defaults: BTreeMap<String, String>) -> Self {
        self.fill_defaults = defaults;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the rule registry.
    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    /// Enable or disable dry-run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether `table` is in the exclusion set.
    pub fn is_excluded(&self, table: &str) -> bool {
        self.excludes.contains(table)
    }

    /// Whether `table` passes the target allow-list.
    pub fn is_targeted(&self, table: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == table)
    }
}

/// Parse `column=value` items into a fill-default map.
///
/// The value may be empty or contain `=`; the column must be a valid identifier.
pub fn parse_fill_defaults<S: AsRef<str>>(items: &[S]) -> Result<BTreeMap<String, String>> {
    let mut defaults = BTreeMap::new();
    for item in items {
        let item = item.as_ref();
        let (column, value) = item
            .split_once('=')
            .ok_or_else(|| Error::InvalidConfig(format!("expected column=value, got {:?}", item)))?;
        let column = column.trim();
        validate_ident(column).map_err(|_| {
            Error::InvalidConfig(format!("invalid fill-default column {:?}", column))
        })?;
        defaults.insert(column.to_string(), value.to_string());
    }
    Ok(defaults)
}
