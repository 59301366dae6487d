//! Positional digits of the 4-digit draw number.
//!
//! A draw number is read as four positions: thousands (`um`), hundreds
//! (`c`), tens (`d`) and units (`u`). Each position yields a digit column
//! and ten one-hot flag columns `{pos}_0` .. `{pos}_9`.

use serde::Serialize;

/// Column holding the raw draw number.
pub const NUMBER_COLUMN: &str = "numero";

/// Column holding the `um-c-d-u` combination string.
pub const COMBINATION_COLUMN: &str = "combinacion";

/// Column holding the zero-padded 4-digit number.
pub const PADDED_COLUMN: &str = "numero4";

/// One digit position of a 4-digit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Thousands.
    Um,
    /// Hundreds.
    C,
    /// Tens.
    D,
    /// Units.
    U,
}

impl Position {
    /// All positions, most significant first.
    pub const ALL: [Position; 4] = [Position::Um, Position::C, Position::D, Position::U];

    /// Column name of this position's digit.
    pub fn column(&self) -> &'static str {
        match self {
            Position::Um => "um",
            Position::C => "c",
            Position::D => "d",
            Position::U => "u",
        }
    }

    /// 1-based offset of this digit in the zero-padded number.
    pub fn offset(&self) -> usize {
        match self {
            Position::Um => 1,
            Position::C => 2,
            Position::D => 3,
            Position::U => 4,
        }
    }

    /// Parse a table-name token (`um`/`umil`, `c`/`centena`, `d`/`decena`,
    /// `u`/`unidad`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "um" | "umil" => Some(Position::Um),
            "c" | "centena" => Some(Position::C),
            "d" | "decena" => Some(Position::D),
            "u" | "unidad" => Some(Position::U),
            _ => None,
        }
    }

    /// Parse a digit column name back to its position.
    pub fn from_column(name: &str) -> Option<Self> {
        Position::ALL.into_iter().find(|p| p.column() == name)
    }

    /// SQL expression extracting this digit from a quoted number column.
    pub fn digit_expr(&self, number_col: &str) -> String {
        format!(
            "CAST(substr({}, {}, 1) AS INTEGER)",
            padded_expr(number_col),
            self.offset()
        )
    }

    /// Name of the one-hot flag column for `digit` at this position.
    pub fn flag_column(&self, digit: u8) -> String {
        format!("{}_{}", self.column(), digit)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Parse a digit token from a table name (`0`..`9` or `cero`).
pub fn parse_digit(token: &str) -> Option<u8> {
    match token.trim().to_lowercase().as_str() {
        "cero" => Some(0),
        t if t.len() == 1 => t.parse::<u8>().ok(),
        _ => None,
    }
}

/// All forty flag column names, position-major.
pub fn flag_columns() -> Vec<String> {
    Position::ALL
        .iter()
        .flat_map(|p| (0..10).map(move |k| p.flag_column(k)))
        .collect()
}

/// Parse a flag column name such as `c_7`.
pub fn parse_flag_column(name: &str) -> Option<(Position, u8)> {
    let (pos, digit) = name.rsplit_once('_')?;
    let position = Position::from_column(pos)?;
    let digit = digit.parse::<u8>().ok().filter(|d| *d < 10)?;
    Some((position, digit))
}

/// SQL expression zero-padding a quoted number column to four digits.
pub fn padded_expr(number_col: &str) -> String {
    format!("printf('%04d', CAST({} AS INTEGER))", number_col)
}

/// SQL expression for the `um-c-d-u` combination string.
pub fn combination_expr(number_col: &str) -> String {
    Position::ALL
        .iter()
        .map(|p| format!("CAST({} AS TEXT)", p.digit_expr(number_col)))
        .collect::<Vec<_>>()
        .join(" || '-' || ")
}

/// SQL expression deriving `column` from the number column, if `column`
/// is one of the derivable digit columns.
pub fn derived_expr(column: &str, number_col: &str) -> Option<String> {
    if let Some(position) = Position::from_column(column) {
        return Some(position.digit_expr(number_col));
    }
    if let Some((position, digit)) = parse_flag_column(column) {
        return Some(format!(
            "CASE WHEN {} = {} THEN 1 ELSE 0 END",
            position.digit_expr(number_col),
            digit
        ));
    }
    match column {
        COMBINATION_COLUMN => Some(combination_expr(number_col)),
        PADDED_COLUMN => Some(padded_expr(number_col)),
        _ => None,
    }
}

/// Whether [`derived_expr`] can produce `column`.
pub fn is_derivable(column: &str) -> bool {
    Position::from_column(column).is_some()
        || parse_flag_column(column).is_some()
        || column == COMBINATION_COLUMN
        || column == PADDED_COLUMN
}

/// Split a number into its four positional digits (modulo 10000).
pub fn split_number(number: i64) -> [u8; 4] {
    let n = number.rem_euclid(10_000);
    [
        (n / 1000) as u8,
        (n / 100 % 10) as u8,
        (n / 10 % 10) as u8,
        (n % 10) as u8,
    ]
}
