//! Error types for the job queue system.

use browserq_db_connection::DbConnectionError;
use thiserror::Error;

use crate::types::JobStatus;

/// Errors that may occur while interacting with the job store.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job store is unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("failed to open job store: {0}")]
    Connection(#[from] DbConnectionError),

    #[error("failed to apply job store migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to serialize job input: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("status {0} cannot complete a job")]
    NonTerminalStatus(JobStatus),

    #[error("job {job_id} cannot move to {status}: it is not in progress")]
    InvalidTransition { job_id: i64, status: JobStatus },

    #[error("corrupt job record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}
