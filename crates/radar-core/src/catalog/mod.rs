//! Store catalog introspection.
//!
//! Answers "which tables and views exist" and "which columns does a table
//! declare, and which of them must an insert supply".

mod column;
mod inspector;
mod object;

pub use column::{ColumnSpec, TableSchema};
pub use inspector::SchemaInspector;
pub use object::{CatalogObject, ObjectKind};
