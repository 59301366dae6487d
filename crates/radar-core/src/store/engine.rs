//! Store handle implementation.

use rusqlite::Connection;

use super::StoreConfig;
use crate::error::{Error, Result};

/// An open SQLite database.
pub struct Store {
    conn: Connection,
    config: StoreConfig,
}

impl Store {
    /// Open the store described by `config`.
    ///
    /// Fails with [`Error::NotFound`] when the file does not exist and
    /// `create_if_missing` is off.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = if config.in_memory {
            Connection::open_in_memory()?
        } else {
            if !config.create_if_missing && !config.path.is_file() {
                return Err(Error::NotFound {
                    name: config.path.display().to_string(),
                });
            }
            Connection::open_with_flags(&config.path, config.to_open_flags())?
        };

        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;

        tracing::debug!(
            path = %config.path.display(),
            in_memory = config.in_memory,
            "store opened"
        );

        Ok(Self { conn, config })
    }

    /// Open a fresh in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Borrow the connection for reads.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Borrow the connection for transactional writes.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Run a batch of SQL statements (schema setup, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Close the connection, reporting any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::from(e))
    }
}
