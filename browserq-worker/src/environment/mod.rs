//! Execution environments hosting the pages jobs run against.
//!
//! A worker launches one [`ExecutionEnvironment`] when it starts and keeps it
//! for its whole life. Every job gets a fresh [`EnvironmentContext`] (an
//! isolated session) and a page inside it, both closed before the next job.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use browserq_job_queue::{EnvironmentError, Page};

pub use http::{HttpEnvironment, HttpLauncher};

/// Starts the long-lived environment for one worker.
#[async_trait]
pub trait EnvironmentLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn ExecutionEnvironment>, EnvironmentError>;
}

#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Open a new isolated sub-context.
    async fn new_context(&self) -> Result<Box<dyn EnvironmentContext>, EnvironmentError>;

    /// Release the environment. Callers bound this with a timeout.
    async fn close(&self) -> Result<(), EnvironmentError>;
}

/// Per-job isolated session.
#[async_trait]
pub trait EnvironmentContext: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn Page>, EnvironmentError>;

    async fn close(&self) -> Result<(), EnvironmentError>;
}
