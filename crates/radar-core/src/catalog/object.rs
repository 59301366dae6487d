//! Catalog objects (tables and views).

use serde::Serialize;

/// Kind of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A base table.
    Table,
    /// A view.
    View,
}

impl ObjectKind {
    /// Parse the `type` column of `sqlite_master`.
    pub fn from_master_type(value: &str) -> Option<Self> {
        match value {
            "table" => Some(ObjectKind::Table),
            "view" => Some(ObjectKind::View),
            _ => None,
        }
    }

    /// Lowercase name as stored in `sqlite_master`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogObject {
    /// Object name, unique within the store.
    pub name: String,
    /// Table or view.
    pub kind: ObjectKind,
}

impl CatalogObject {
    /// Create a new catalog entry.
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Check if this object is a view.
    pub fn is_view(&self) -> bool {
        self.kind == ObjectKind::View
    }
}
