//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::OpenFlags;

/// Default time to wait on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for opening the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file.
    pub path: PathBuf,

    /// How long a statement waits on a lock held by another writer.
    pub busy_timeout: Duration,

    /// Enforce foreign keys on this connection.
    pub foreign_keys: bool,

    /// Create the file if it does not exist. The CLI never does this:
    /// a missing database is a fatal precondition.
    pub create_if_missing: bool,

    /// Open a private in-memory database instead of `path`.
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("radar_premios.db"),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
            create_if_missing: false,
            in_memory: false,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// In-memory configuration for testing.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            in_memory: true,
            create_if_missing: true,
            ..Default::default()
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set foreign key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Allow creating a new database file.
    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    /// Convert to rusqlite open flags.
    pub(crate) fn to_open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        flags
    }
}
