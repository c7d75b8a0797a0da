use browserq_job_queue::{EnvironmentError, JobQueueError};
use thiserror::Error;

/// Errors that end a worker loop with a failure.
///
/// Environment faults met while executing a job are not errors: they shut the
/// worker down cleanly and are reported through
/// [`ShutdownReason`](crate::ShutdownReason).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job store error: {0}")]
    Queue(#[from] JobQueueError),

    #[error("could not start execution environment: {0}")]
    Launch(#[source] EnvironmentError),
}
