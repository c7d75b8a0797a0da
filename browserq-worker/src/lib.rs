//! Worker side of browserq.
//!
//! A [`WorkerLoop`] repeatedly claims the oldest pending job from a
//! [`JobStore`](browserq_job_queue::JobStore), runs it inside a fresh
//! sub-context of its [`ExecutionEnvironment`](environment::ExecutionEnvironment)
//! and records the result. It stops when its cancellation token fires, when
//! the environment fails, or when the store becomes unreachable.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use browserq_db_connection::StoreConnectionConfig;
//! use browserq_job_queue::{JobRegistry, JobStore};
//! use browserq_worker::{HttpLauncher, WorkerConfig, WorkerLoop};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = JobStore::connect(&StoreConnectionConfig::new("browserq.sqlite")).await?;
//!     let mut registry = JobRegistry::new();
//!     browserq_jobs::register_builtin_jobs(&mut registry);
//!
//!     let worker = WorkerLoop::new(
//!         "worker-1",
//!         store,
//!         Arc::new(registry),
//!         Arc::new(HttpLauncher::new()),
//!         WorkerConfig::default(),
//!     );
//!     let reason = worker.run(CancellationToken::new()).await?;
//!     println!("stopped: {reason}");
//!     Ok(())
//! }
//! ```

pub mod environment;
mod error;
pub mod lifecycle;
pub mod shutdown;
mod worker;

pub use environment::{
    EnvironmentContext, EnvironmentLauncher, ExecutionEnvironment, HttpEnvironment, HttpLauncher,
};
pub use error::WorkerError;
pub use worker::{ShutdownReason, WorkerConfig, WorkerLoop};
