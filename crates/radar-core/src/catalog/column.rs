//! Column metadata.

use serde::Serialize;

/// One declared column of a table, as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Whether the column declares a DEFAULT.
    pub has_default: bool,
    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

impl ColumnSpec {
    /// Create a nullable column without default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            has_default: false,
            is_primary_key: false,
        }
    }

    /// Mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as having a DEFAULT.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Mark as primary key member.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// A column an INSERT must supply explicitly: NOT NULL, not part of
    /// the primary key and without a default.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.is_primary_key && !self.has_default
    }
}

/// The ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a schema from its columns.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of required columns, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_required())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Check whether a column with this name is declared.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rule() {
        assert!(ColumnSpec::new("signo").not_null().is_required());
        assert!(!ColumnSpec::new("signo").is_required());
        assert!(!ColumnSpec::new("etiqueta").not_null().with_default().is_required());
        assert!(!ColumnSpec::new("id").not_null().primary_key().is_required());
    }

    #[test]
    fn test_table_schema_lookups() {
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnSpec::new("id").primary_key(),
                ColumnSpec::new("fecha").not_null(),
                ColumnSpec::new("etiqueta").not_null().with_default(),
                ColumnSpec::new("numero").not_null(),
            ],
        );

        assert_eq!(schema.column_names(), vec!["id", "fecha", "etiqueta", "numero"]);
        assert_eq!(schema.required_names(), vec!["fecha", "numero"]);
        assert!(schema.has_column("etiqueta"));
        assert!(!schema.has_column("signo"));
        assert!(schema.column("id").unwrap().is_primary_key);
    }
}
