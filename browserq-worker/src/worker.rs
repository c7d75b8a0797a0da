//! The per-worker claim/execute loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use browserq_job_queue::{EnvironmentError, Job, JobError, JobRegistry, JobStatus, JobStore, Page};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::environment::{EnvironmentContext, EnvironmentLauncher, ExecutionEnvironment};
use crate::error::WorkerError;
use crate::lifecycle::{cancel_task, close_context, close_page, panic_message, shutdown_environment};

/// Timing knobs for a [`WorkerLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Sleep between claims when the queue is empty.
    pub poll_interval: Duration,
    /// Minimum gap between "still alive" logs while idle.
    pub heartbeat_interval: Duration,
    /// Upper bound on environment teardown.
    pub close_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(browserq_config::DEFAULT_POLL_INTERVAL_SECS),
            heartbeat_interval: Duration::from_secs(
                browserq_config::DEFAULT_HEARTBEAT_INTERVAL_SECS,
            ),
            close_timeout: Duration::from_secs(browserq_config::DEFAULT_CLOSE_TIMEOUT_SECS),
        }
    }
}

impl From<&browserq_config::WorkerConfig> for WorkerConfig {
    fn from(cfg: &browserq_config::WorkerConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            heartbeat_interval: Duration::from_secs(cfg.heartbeat_interval_secs),
            close_timeout: Duration::from_secs(cfg.close_timeout_secs),
        }
    }
}

/// Why a worker stopped claiming jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The shutdown token fired.
    Signal,
    /// The execution environment failed while running a job.
    EnvironmentFault(EnvironmentError),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("shutdown requested"),
            Self::EnvironmentFault(e) => write!(f, "environment fault: {e}"),
        }
    }
}

enum State {
    Idle,
    Executing(Job),
    ShuttingDown(ShutdownReason),
}

/// How a single job run ended.
enum Outcome {
    Completed(Option<Vec<u8>>),
    Failed(String),
    EnvironmentFault(EnvironmentError),
    Cancelled,
}

impl From<JobError> for Outcome {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Environment(e) => Self::EnvironmentFault(e),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Claims jobs from a [`JobStore`] one at a time and runs them against a
/// private execution environment.
///
/// The environment is launched when [`run`](Self::run) starts and torn down
/// before it returns, whatever the reason for stopping.
pub struct WorkerLoop {
    name: String,
    store: JobStore,
    registry: Arc<JobRegistry>,
    launcher: Arc<dyn EnvironmentLauncher>,
    config: WorkerConfig,
}

impl fmt::Debug for WorkerLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLoop")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl WorkerLoop {
    pub fn new(
        name: impl Into<String>,
        store: JobStore,
        registry: Arc<JobRegistry>,
        launcher: Arc<dyn EnvironmentLauncher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            registry,
            launcher,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until `shutdown` fires, the environment fails, or the store errors.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<ShutdownReason, WorkerError> {
        let span = info_span!("worker", worker.name = %self.name);
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner(&self, shutdown: CancellationToken) -> Result<ShutdownReason, WorkerError> {
        let environment = self.launcher.launch().await.map_err(|e| {
            error!(error = %e, "failed to launch execution environment");
            WorkerError::Launch(e)
        })?;
        info!(jobs = ?self.registry.names(), "ready to work");

        let result = self.drive(environment.as_ref(), &shutdown).await;

        shutdown_environment(environment.as_ref(), self.config.close_timeout).await;

        match &result {
            Ok(reason) => info!(%reason, "worker stopped"),
            Err(e) => error!(error = %e, "worker stopped on store error"),
        }
        result
    }

    async fn drive(
        &self,
        environment: &dyn ExecutionEnvironment,
        shutdown: &CancellationToken,
    ) -> Result<ShutdownReason, WorkerError> {
        let mut state = State::Idle;
        let mut last_heartbeat = Instant::now();

        loop {
            state = match state {
                State::Idle => self.idle(shutdown, &mut last_heartbeat).await?,
                State::Executing(job) => self.execute(environment, job, shutdown).await?,
                State::ShuttingDown(reason) => return Ok(reason),
            };
        }
    }

    async fn idle(
        &self,
        shutdown: &CancellationToken,
        last_heartbeat: &mut Instant,
    ) -> Result<State, WorkerError> {
        if shutdown.is_cancelled() {
            info!("shutting down worker (no jobs interrupted)");
            return Ok(State::ShuttingDown(ShutdownReason::Signal));
        }

        if let Some(job) = self.store.claim(&self.name).await? {
            *last_heartbeat = Instant::now();
            return Ok(State::Executing(job));
        }

        if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
            info!("worker is alive and polling for jobs");
            *last_heartbeat = Instant::now();
        }

        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = sleep(self.config.poll_interval) => {}
        }
        Ok(State::Idle)
    }

    async fn execute(
        &self,
        environment: &dyn ExecutionEnvironment,
        job: Job,
        shutdown: &CancellationToken,
    ) -> Result<State, WorkerError> {
        let span = info_span!("job", job.id = job.id, job.name = %job.name);
        async {
            // A job claimed while shutdown was already underway is failed
            // without ever opening a sub-context.
            let outcome = if shutdown.is_cancelled() {
                Outcome::Cancelled
            } else {
                info!("starting job");
                self.run_job(environment, &job, shutdown).await
            };

            let next = match outcome {
                Outcome::Completed(output) => {
                    self.store
                        .complete(job.id, JobStatus::Done, output.as_deref())
                        .await?;
                    info!(
                        output_bytes = output.as_ref().map_or(0, Vec::len),
                        "job is done"
                    );
                    State::Idle
                }
                Outcome::Failed(reason) => {
                    self.store.complete(job.id, JobStatus::Failed, None).await?;
                    warn!(error = %reason, "job execution failed");
                    State::Idle
                }
                Outcome::EnvironmentFault(e) => {
                    self.store.complete(job.id, JobStatus::Failed, None).await?;
                    error!(error = %e, "job interrupted by environment fault, marked as failed");
                    State::ShuttingDown(ShutdownReason::EnvironmentFault(e))
                }
                Outcome::Cancelled => {
                    self.store.complete(job.id, JobStatus::Failed, None).await?;
                    error!("job interrupted by shutdown, marked as failed");
                    State::ShuttingDown(ShutdownReason::Signal)
                }
            };
            Ok::<_, WorkerError>(next)
        }
        .instrument(span)
        .await
    }

    /// Open a sub-context for `job`, run it, and close the sub-context.
    async fn run_job(
        &self,
        environment: &dyn ExecutionEnvironment,
        job: &Job,
        shutdown: &CancellationToken,
    ) -> Outcome {
        let context = match environment.new_context().await {
            Ok(context) => context,
            Err(e) => return Outcome::EnvironmentFault(e),
        };

        let outcome = self.run_in_context(context.as_ref(), job, shutdown).await;
        close_context(context.as_ref()).await;
        outcome
    }

    async fn run_in_context(
        &self,
        context: &dyn EnvironmentContext,
        job: &Job,
        shutdown: &CancellationToken,
    ) -> Outcome {
        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => return Outcome::EnvironmentFault(e),
        };

        let outcome = self.run_on_page(page.clone(), job, shutdown).await;
        close_page(page.as_ref()).await;
        outcome
    }

    /// Race the job task against `shutdown`.
    ///
    /// The task is always awaited before returning, so nothing it owns
    /// outlives this call.
    async fn run_on_page(
        &self,
        page: Arc<dyn Page>,
        job: &Job,
        shutdown: &CancellationToken,
    ) -> Outcome {
        let executor = match self.registry.build(&job.name, &job.input) {
            Ok(executor) => executor,
            Err(e) => return e.into(),
        };

        let mut task = tokio::spawn(async move { executor.execute(page.as_ref()).await });

        tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(Ok(output)) => Outcome::Completed(output),
                Ok(Err(e)) => e.into(),
                Err(e) if e.is_panic() => {
                    Outcome::Failed(format!("job panicked: {}", panic_message(e.into_panic().as_ref())))
                }
                Err(e) => Outcome::Failed(e.to_string()),
            },
            _ = shutdown.cancelled() => {
                debug!("cancelling in-flight job");
                cancel_task(task).await;
                Outcome::Cancelled
            }
        }
    }
}
