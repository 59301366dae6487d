//! Derivation rules: how a downstream table's rows are computed from the matrix.
//!
//! A table's rule is chosen by matching its name against the patterns of a
//! [`RuleRegistry`]. The first match wins and unmatched names use the plain
//! [`DerivationRule::Projection`].
//!
//! | Name | Rule |
//! |------|------|
//! | `cuando_{d}_es_{positions}` | rows where every listed position equals `d` |
//! | `todo_cuando_{d}_es` | rows where any position equals `d` |
//! | `todos_cuando_son` | one row per matrix row and position (unpivot) |
//! | `{ordinal}_resumen_matriz_aslu`, `todos_resumen_matriz_aslu` | projection with derived digit columns |

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::catalog::TableSchema;
use crate::error::{Error, Result};
use crate::matrix::digits::{self, parse_digit, Position, NUMBER_COLUMN};
use crate::sql::{column_list, quote_ident, quote_literal};

/// Column receiving the position label in an unpivoted table.
pub const POSITION_LABEL_COLUMN: &str = "posicion";

/// Columns receiving the position's digit in an unpivoted table.
pub const POSITION_VALUE_COLUMNS: &[&str] = &["valor_pos", "digito"];

/// How a downstream table is populated from the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationRule {
    /// Copy shared columns verbatim.
    Projection,
    /// Keep rows where every position of every group equals `digit`.
    DigitFilter {
        /// Digit filtered on.
        digit: u8,
        /// Position groups parsed from the name (`_y_` separated).
        groups: Vec<Vec<Position>>,
    },
    /// Keep rows where any position equals `digit`.
    AnyPosition {
        /// Digit filtered on.
        digit: u8,
    },
    /// One output row per matrix row and position.
    Unpivot,
    /// Projection that derives digit columns from `numero` when the matrix lacks them.
    DigitColumns,
}

impl DerivationRule {
    /// Whether derived digit columns may be computed from `numero`.
    pub fn derives_digits(&self) -> bool {
        !matches!(self, DerivationRule::Projection)
    }

    /// Positions the rule reads regardless of the target's columns.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            DerivationRule::Projection | DerivationRule::DigitColumns => Vec::new(),
            DerivationRule::DigitFilter { groups, .. } => {
                let mut positions: Vec<Position> = Vec::new();
                for p in groups.iter().flatten() {
                    if !positions.contains(p) {
                        positions.push(*p);
                    }
                }
                positions
            }
            DerivationRule::AnyPosition { .. } | DerivationRule::Unpivot => Position::ALL.to_vec(),
        }
    }
}

impl std::fmt::Display for DerivationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerivationRule::Projection => write!(f, "projection"),
            DerivationRule::DigitFilter { digit, groups } => {
                let groups: Vec<String> = groups
                    .iter()
                    .map(|g| g.iter().map(Position::column).collect::<Vec<_>>().join(","))
                    .collect();
                write!(f, "digit {} at {}", digit, groups.join(" and "))
            }
            DerivationRule::AnyPosition { digit } => write!(f, "digit {} at any position", digit),
            DerivationRule::Unpivot => write!(f, "unpivot um/c/d/u"),
            DerivationRule::DigitColumns => write!(f, "digit columns"),
        }
    }
}

/// Rule family a registry pattern maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Needs named groups `d` and `pat`.
    DigitFilter,
    /// Needs named group `d`.
    AnyPosition,
    /// No captures.
    Unpivot,
    /// No captures.
    DigitColumns,
}

impl RuleKind {
    fn build(&self, caps: &Captures<'_>) -> Option<DerivationRule> {
        match self {
            RuleKind::DigitFilter => {
                let digit = parse_digit(caps.name("d")?.as_str())?;
                let groups: Vec<Vec<Position>> = caps
                    .name("pat")?
                    .as_str()
                    .split("_y_")
                    .map(|part| part.split('_').filter_map(Position::from_token).collect::<Vec<_>>())
                    .filter(|group| !group.is_empty())
                    .collect();
                if groups.is_empty() {
                    return None;
                }
                Some(DerivationRule::DigitFilter { digit, groups })
            }
            RuleKind::AnyPosition => {
                let digit = parse_digit(caps.name("d")?.as_str())?;
                Some(DerivationRule::AnyPosition { digit })
            }
            RuleKind::Unpivot => Some(DerivationRule::Unpivot),
            RuleKind::DigitColumns => Some(DerivationRule::DigitColumns),
        }
    }
}

const BUILTIN_PATTERNS: &[(&str, RuleKind)] = &[
    (r"^cuando_(?P<d>[a-z0-9]+)_es_(?P<pat>.+)$", RuleKind::DigitFilter),
    (r"^todo_cuando_(?P<d>[a-z0-9]+)_es$", RuleKind::AnyPosition),
    (r"^todos_cuando_son$", RuleKind::Unpivot),
    (
        r"^(primer|segundo|tercer|cuarto|quinto|sexto|septimo|octavo|noveno|decimo)_resumen_matriz_aslu$",
        RuleKind::DigitColumns,
    ),
    (r"^todos_resumen_matriz_aslu$", RuleKind::DigitColumns),
];

#[derive(Debug, Clone)]
struct RulePattern {
    regex: Regex,
    kind: RuleKind,
}

static BUILTIN_RULES: LazyLock<Vec<RulePattern>> = LazyLock::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|(pattern, kind)| RulePattern {
            regex: Regex::new(pattern).expect("built-in rule pattern compiles"),
            kind: *kind,
        })
        .collect()
});

/// Ordered table-name patterns mapped to rule families.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    patterns: Vec<RulePattern>,
}

impl RuleRegistry {
    /// Registry with the built-in patterns.
    pub fn builtin() -> Self {
        Self {
            patterns: BUILTIN_RULES.clone(),
        }
    }

    /// Registry without patterns: every table is a plain projection.
    pub fn projection_only() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Append a pattern, matched after the existing ones.
    pub fn with_pattern(mut self, pattern: &str, kind: RuleKind) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("invalid rule pattern {:?}: {}", pattern, e)))?;
        self.patterns.push(RulePattern { regex, kind });
        Ok(self)
    }

    /// Whether any pattern is registered.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Rule for a table name.
    ///
    /// Returns `None` when the first matching pattern cannot parse the name
    /// (e.g. an unknown digit token); such tables must not be treated as a
    /// plain projection.
    pub fn resolve(&self, table: &str) -> Option<DerivationRule> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(table) {
                return pattern.kind.build(&caps);
            }
        }
        Some(DerivationRule::Projection)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Where one target column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnSource<'a> {
    Matrix(&'a str),
    PositionLabel,
    PositionValue,
    Derived(&'a str),
}

/// Resolves target columns to SQL expressions over the matrix for one rule.
pub struct ColumnResolver<'a> {
    matrix: &'a TableSchema,
    rule: &'a DerivationRule,
}

impl<'a> ColumnResolver<'a> {
    /// Create a resolver for a matrix schema and a rule.
    pub fn new(matrix: &'a TableSchema, rule: &'a DerivationRule) -> Self {
        Self { matrix, rule }
    }

    fn can_derive(&self) -> bool {
        self.rule.derives_digits() && self.matrix.has_column(NUMBER_COLUMN)
    }

    fn source_of<'n>(&self, column: &'n str) -> Option<ColumnSource<'n>> {
        if self.matrix.has_column(column) {
            return Some(ColumnSource::Matrix(column));
        }
        if *self.rule == DerivationRule::Unpivot {
            if column == POSITION_LABEL_COLUMN {
                return Some(ColumnSource::PositionLabel);
            }
            if POSITION_VALUE_COLUMNS.contains(&column) {
                return Some(ColumnSource::PositionValue);
            }
        }
        if self.can_derive() && digits::is_derivable(column) {
            return Some(ColumnSource::Derived(column));
        }
        None
    }

    /// Whether the rule can supply a value for `column`.
    pub fn supplies(&self, column: &str) -> bool {
        self.source_of(column).is_some()
    }

    /// Whether the matrix can supply the digit at `position`.
    pub fn has_position(&self, position: Position) -> bool {
        self.matrix.has_column(position.column()) || self.can_derive()
    }

    /// Positions the rule reads that the matrix cannot supply.
    pub fn missing_positions(&self) -> Vec<String> {
        self.rule
            .positions()
            .into_iter()
            .filter(|p| !self.has_position(*p))
            .map(|p| p.column().to_string())
            .collect()
    }

    fn position_expr(&self, position: Position) -> Result<String> {
        if self.matrix.has_column(position.column()) {
            quote_ident(position.column())
        } else {
            Ok(position.digit_expr(&quote_ident(NUMBER_COLUMN)?))
        }
    }

    fn column_expr(&self, column: &str, position: Position) -> Result<String> {
        match self.source_of(column) {
            Some(ColumnSource::Matrix(name)) => quote_ident(name),
            Some(ColumnSource::PositionLabel) => Ok(quote_literal(position.column())),
            Some(ColumnSource::PositionValue) => self.position_expr(position),
            Some(ColumnSource::Derived(name)) => {
                let number = quote_ident(NUMBER_COLUMN)?;
                digits::derived_expr(name, &number).ok_or_else(|| Error::InvalidIdentifier {
                    name: name.to_string(),
                })
            }
            None => Err(Error::IncompatibleSchema {
                table: column.to_string(),
                source_table: self.matrix.name.clone(),
                missing: vec![column.to_string()],
            }),
        }
    }

    fn select_sql(&self, columns: &[String], position: Position) -> Result<String> {
        let exprs = columns
            .iter()
            .map(|c| self.column_expr(c, position))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "SELECT {} FROM {}",
            exprs.join(", "),
            quote_ident(&self.matrix.name)?
        ))
    }

    fn where_clause(&self) -> Result<Option<String>> {
        match self.rule {
            DerivationRule::DigitFilter { digit, groups } => {
                let mut clauses = Vec::with_capacity(groups.len());
                for group in groups {
                    let terms = group
                        .iter()
                        .map(|p| Ok(format!("{} = {}", self.position_expr(*p)?, digit)))
                        .collect::<Result<Vec<_>>>()?;
                    clauses.push(format!("({})", terms.join(" AND ")));
                }
                Ok(Some(clauses.join(" AND ")))
            }
            DerivationRule::AnyPosition { digit } => {
                let terms = Position::ALL
                    .iter()
                    .map(|p| Ok(format!("{} = {}", self.position_expr(*p)?, digit)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(format!("({})", terms.join(" OR "))))
            }
            _ => Ok(None),
        }
    }

    /// `INSERT … SELECT` populating `table`'s `columns` from the matrix.
    pub fn insert_sql(&self, table: &str, columns: &[String]) -> Result<String> {
        let target = format!("INSERT INTO {} ({})", quote_ident(table)?, column_list(columns)?);

        if *self.rule == DerivationRule::Unpivot {
            let branches = Position::ALL
                .iter()
                .map(|p| self.select_sql(columns, *p))
                .collect::<Result<Vec<_>>>()?;
            return Ok(format!("{} {}", target, branches.join(" UNION ALL ")));
        }

        // Position is only read by unpivot columns.
        let mut sql = format!("{} {}", target, self.select_sql(columns, Position::Um)?);
        if let Some(filter) = self.where_clause()? {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        Ok(sql)
    }
}
