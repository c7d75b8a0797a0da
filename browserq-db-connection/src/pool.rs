use std::fs::create_dir_all;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::StoreConnectionConfig;
use crate::error::DbConnectionError;
use crate::utils::config_metadata;

pub type DbPool = SqlitePool;

/// Opens the connection pool for the job store.
///
/// Every connection runs in WAL journal mode so point lookups never wait on
/// a writer, and carries the configured busy timeout so concurrent claim
/// transactions queue on the reserved lock.
pub async fn create_pool(config: &StoreConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;

    if config.create_if_missing {
        ensure_parent_dir(config)?;
    } else if !config.path.exists() {
        return Err(DbConnectionError::DatabaseNotFound(config.path.clone()));
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(config.create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout())
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout())
        .connect_with(options)
        .await?;

    tracing::debug!(config = %config_metadata(config), "opened store connection pool");
    Ok(pool)
}

fn ensure_parent_dir(config: &StoreConnectionConfig) -> Result<(), DbConnectionError> {
    let Some(parent) = config
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    else {
        return Ok(());
    };

    create_dir_all(parent).map_err(|e| {
        DbConnectionError::FileCreation(format!(
            "failed to create parent directory '{}': {e}",
            parent.display()
        ))
    })
}
