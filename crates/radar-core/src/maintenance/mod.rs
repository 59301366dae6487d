//! Store maintenance around a refresh run.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`ensure_indexes`] | `CREATE INDEX IF NOT EXISTS` on the matrix and downstream tables |
//! | [`recreate_view`] | `todo` view rebuilt as `SELECT *` over the matrix |
//! | [`verify`] | row counts and latest `fecha` of key objects |
//! | [`normalize_dates`] | `DD/MM/YYYY` rewritten to `YYYY-MM-DD` |
//! | [`vacuum`], [`optimize`] | file compaction and planner statistics |

mod compact;
mod dates;
pub mod indexes;
mod verify;
mod views;

pub use compact::{optimize, vacuum};
pub use dates::{normalize_dates, DateNormalization};
pub use indexes::{ensure_indexes, IndexSpec};
pub use verify::{default_verify_targets, verify, Verification};
pub use views::{recreate_view, DEFAULT_VIEW};
