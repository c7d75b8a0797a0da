//! Traits implemented by jobs and the page handle they run against.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::JobInput;

/// Failure of the execution environment itself.
///
/// Once one of these surfaces the environment's state can no longer be
/// trusted, so the worker stops claiming jobs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("failed to launch execution environment: {0}")]
    Launch(String),

    #[error("execution environment is closed")]
    Closed,

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("execution environment error: {0}")]
    Protocol(String),
}

/// Errors a job can return from [`JobExecutor::execute`] or its factory.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("no job registered under {0:?}")]
    UnknownJob(String),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

impl JobError {
    /// Shorthand for a job-level failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }

    /// True when the error came from the environment rather than job logic.
    #[inline]
    pub const fn is_environment_fault(&self) -> bool {
        matches!(self, Self::Environment(_))
    }
}

/// Result of a page navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
    pub status: u16,
}

impl Navigation {
    #[inline]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// An isolated page/session opened inside a per-job context.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to `url`, replacing the current document.
    async fn goto(&self, url: &str) -> Result<Navigation, EnvironmentError>;

    /// Body of the current document, empty before the first navigation.
    async fn content(&self) -> Result<String, EnvironmentError>;

    /// URL of the current document, if any.
    fn url(&self) -> Option<String>;

    async fn close(&self) -> Result<(), EnvironmentError>;
}

/// Trait for implementing job handlers.
///
/// An instance is built from the job's input by a [`JobFactory`] and runs
/// once against a fresh page.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute the job, returning the bytes to persist as its output.
    async fn execute(&self, page: &dyn Page) -> Result<Option<Vec<u8>>, JobError>;
}

/// Builds a [`JobExecutor`] from a job's stored input.
pub trait JobFactory: Send + Sync {
    fn build(&self, input: &JobInput) -> Result<Box<dyn JobExecutor>, JobError>;
}

impl<F> JobFactory for F
where
    F: Fn(&JobInput) -> Result<Box<dyn JobExecutor>, JobError> + Send + Sync,
{
    fn build(&self, input: &JobInput) -> Result<Box<dyn JobExecutor>, JobError> {
        self(input)
    }
}
