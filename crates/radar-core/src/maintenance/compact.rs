//! File compaction and planner statistics.

use rusqlite::Connection;

use crate::error::Result;

/// Rebuild the database file. Must run outside a transaction.
pub fn vacuum(conn: &Connection) -> Result<()> {
    tracing::info!("running VACUUM");
    conn.execute_batch("VACUUM")?;
    Ok(())
}

/// Refresh query-planner statistics.
pub fn optimize(conn: &Connection) -> Result<()> {
    tracing::info!("running PRAGMA optimize");
    conn.execute_batch("PRAGMA optimize")?;
    Ok(())
}
