//! Durable job queue used by browserq workers.
//!
//! Jobs live in a SQLite database shared by every worker process. Workers
//! coordinate only through [`JobStore::claim`], whose write-locking
//! transaction hands each pending job to exactly one caller.
//!
//! # Architecture
//!
//! - [`JobStore`] - enqueue, claim, complete and look up jobs
//! - [`Job`] / [`JobOutput`] - persisted records
//! - [`JobExecutor`] / [`JobFactory`] - traits implemented by job handlers
//! - [`JobRegistry`] - name to factory mapping handed to workers
//! - [`Page`] - isolated page/session a job runs against
//!
//! # Example
//!
//! ```rust,no_run
//! use browserq_db_connection::StoreConnectionConfig;
//! use browserq_job_queue::{JobInput, JobStatus, JobStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), browserq_job_queue::JobQueueError> {
//!     let config = StoreConnectionConfig::new("browserq.sqlite").create_if_missing(true);
//!     let store = JobStore::connect(&config).await?;
//!     store.migrate().await?;
//!
//!     let job = store.enqueue("noop", JobInput::new()).await?;
//!     if let Some(claimed) = store.claim("worker-1").await? {
//!         store.complete(claimed.id, JobStatus::Done, Some(b"ok")).await?;
//!     }
//!     println!("job {} finished", job.id);
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod registry;
mod store;
mod types;

pub use error::JobQueueError;
pub use executor::{
    EnvironmentError, JobError, JobExecutor, JobFactory, Navigation, Page,
};
pub use registry::JobRegistry;
pub use store::JobStore;
pub use types::{Job, JobInput, JobOutput, JobStatus};

// Re-export async_trait for convenience when implementing JobExecutor
pub use async_trait::async_trait;
