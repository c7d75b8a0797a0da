//! Teardown helpers for job tasks, sub-contexts and the environment.
//!
//! None of these return errors: cleanup failures are logged and the worker
//! moves on.

use std::any::Any;
use std::time::Duration;

use browserq_job_queue::Page;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::environment::{EnvironmentContext, ExecutionEnvironment};

/// Abort an in-flight task and wait until it is gone.
pub async fn cancel_task<T>(task: JoinHandle<T>) {
    task.abort();
    match task.await {
        Ok(_) => debug!("task finished before it could be aborted"),
        Err(e) if e.is_cancelled() => debug!("task aborted"),
        Err(e) => debug!(error = %e, "cancelled task clean up error"),
    }
}

pub async fn close_page(page: &dyn Page) {
    if let Err(e) = page.close().await {
        warn!(error = %e, "failed to close page");
    }
}

pub async fn close_context(context: &dyn EnvironmentContext) {
    if let Err(e) = context.close().await {
        warn!(error = %e, "failed to close context");
    }
}

/// Close the environment, giving up after `timeout`.
///
/// Returns `true` when the environment closed cleanly.
pub async fn shutdown_environment(environment: &dyn ExecutionEnvironment, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, environment.close()).await {
        Ok(Ok(())) => {
            debug!("execution environment closed");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "failed to close execution environment gracefully");
            false
        }
        Err(_) => {
            warn!(?timeout, "timed out closing execution environment");
            false
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use async_trait::async_trait;
    use browserq_job_queue::EnvironmentError;

    struct HangingEnvironment;

    #[async_trait]
    impl ExecutionEnvironment for HangingEnvironment {
        async fn new_context(&self) -> Result<Box<dyn EnvironmentContext>, EnvironmentError> {
            Err(EnvironmentError::Closed)
        }

        async fn close(&self) -> Result<(), EnvironmentError> {
            std::future::pending().await
        }
    }

    struct BrokenEnvironment;

    #[async_trait]
    impl ExecutionEnvironment for BrokenEnvironment {
        async fn new_context(&self) -> Result<Box<dyn EnvironmentContext>, EnvironmentError> {
            Err(EnvironmentError::Closed)
        }

        async fn close(&self) -> Result<(), EnvironmentError> {
            Err(EnvironmentError::Protocol("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_shutdown_environment_times_out() {
        let start = Instant::now();
        let closed = shutdown_environment(&HangingEnvironment, Duration::from_millis(50)).await;
        assert!(!closed);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_shutdown_environment_swallows_errors() {
        assert!(!shutdown_environment(&BrokenEnvironment, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_cancel_task_waits_for_abort() {
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));

        struct SetOnDrop(Arc<std::sync::atomic::AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let guard = SetOnDrop(dropped.clone());
        let task = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });

        cancel_task(task).await;
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "job panicked");
    }
}
