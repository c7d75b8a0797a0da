use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or opening the store pool.
#[derive(Debug, Error)]
pub enum DbConnectionError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,
    #[error("invalid connection setting: {0}")]
    InvalidSetting(String),
    #[error("database file {} does not exist", .0.display())]
    DatabaseNotFound(PathBuf),
    #[error("file/directory creation error: {0}")]
    FileCreation(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
