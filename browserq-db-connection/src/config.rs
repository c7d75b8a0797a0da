use std::path::PathBuf;
use std::time::Duration;

use crate::error::DbConnectionError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Settings for opening the SQLite file that backs the job store.
///
/// The busy timeout bounds how long a writer waits on another writer's
/// reserved lock; claim transactions rely on it to queue up behind each other
/// instead of failing with `SQLITE_BUSY`.
#[derive(Debug, Clone)]
pub struct StoreConnectionConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub create_if_missing: bool,
}

impl Default for StoreConnectionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            create_if_missing: false,
        }
    }
}

impl StoreConnectionConfig {
    /// Creates a configuration for an existing database file.
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Allow the pool to create the database file when it does not exist yet.
    #[inline]
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Reject settings the pool cannot work with.
    pub fn validate(&self) -> Result<(), DbConnectionError> {
        if self.path.as_os_str().is_empty() {
            return Err(DbConnectionError::EmptyDatabasePath);
        }
        if self.max_connections == 0 {
            return Err(DbConnectionError::InvalidSetting(
                "max_connections must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
