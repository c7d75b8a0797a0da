//! SQLite-backed job store.

use browserq_db_connection::{create_pool, DbPool, StoreConnectionConfig};
use tracing::{debug, instrument, warn};

use crate::error::JobQueueError;
use crate::types::{Job, JobInput, JobOutput, JobRow, JobStatus, OutputRow};

const JOB_COLUMNS: &str = "id, name, input, status, created_at, updated_at, worker";

/// Durable job queue shared by every worker pointed at the same database.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: DbPool,
}

impl JobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `config` and wrap it.
    pub async fn connect(config: &StoreConnectionConfig) -> Result<Self, JobQueueError> {
        Ok(Self::new(create_pool(config).await?))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), JobQueueError> {
        browserq_migrations::sqlite_migrator().run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a new pending job.
    #[instrument(skip(self, input))]
    pub async fn enqueue(&self, name: &str, input: JobInput) -> Result<Job, JobQueueError> {
        let input_json = serde_json::to_string(&input)?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO jobs (name, input, status) VALUES (?, ?, ?) RETURNING {JOB_COLUMNS}"
        ))
        .bind(name)
        .bind(input_json)
        .bind(JobStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        let job = Job::try_from(row)?;
        debug!(job.id = job.id, "enqueued job");
        Ok(job)
    }

    /// Claim the oldest pending job for `worker`.
    ///
    /// The select and update run inside a `BEGIN IMMEDIATE` transaction, which
    /// takes SQLite's reserved lock before any row is read. A concurrent caller
    /// waits on that lock (up to the pool's busy timeout) and then sees the
    /// committed state, so each pending job is handed to exactly one worker. A
    /// miss rolls back straight away to release the lock.
    ///
    /// A claimed row that cannot be read back as a [`Job`] (input that is not
    /// a JSON object, unparsable timestamps) is marked `failed` in the same
    /// transaction and the next pending job is tried instead.
    pub async fn claim(&self, worker: &str) -> Result<Option<Job>, JobQueueError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let mut rejected = 0_u32;

        loop {
            let candidate: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM jobs WHERE status = ? ORDER BY created_at ASC, id ASC LIMIT 1",
            )
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(job_id) = candidate else {
                if rejected == 0 {
                    tx.rollback().await?;
                } else {
                    tx.commit().await?;
                }
                return Ok(None);
            };

            let row = sqlx::query_as::<_, JobRow>(&format!(
                "UPDATE jobs \
                 SET status = ?, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now'), worker = ? \
                 WHERE id = ? \
                 RETURNING {JOB_COLUMNS}"
            ))
            .bind(JobStatus::InProgress.as_str())
            .bind(worker)
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

            match Job::try_from(row) {
                Ok(job) => {
                    tx.commit().await?;
                    debug!(job.id = job.id, job.name = %job.name, worker, "claimed job");
                    return Ok(Some(job));
                }
                Err(JobQueueError::Corrupt { id, reason }) => {
                    warn!(job.id = id, %reason, worker, "unreadable job marked as failed");
                    sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
                        .bind(JobStatus::Failed.as_str())
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    rejected += 1;
                }
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }
    }

    /// Record the final status of an in-progress job.
    ///
    /// `output` is stored only for `Done` jobs and only when non-empty. Must be
    /// called at most once per job; a second call fails because the job is no
    /// longer in progress.
    pub async fn complete(
        &self,
        job_id: i64,
        status: JobStatus,
        output: Option<&[u8]>,
    ) -> Result<(), JobQueueError> {
        if !status.is_terminal() {
            return Err(JobQueueError::NonTerminalStatus(status));
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE jobs \
             SET status = ?, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') \
             WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(job_id)
        .bind(JobStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(JobQueueError::InvalidTransition { job_id, status });
        }

        let output = output.filter(|bytes| status == JobStatus::Done && !bytes.is_empty());
        if let Some(bytes) = output {
            sqlx::query("INSERT INTO outputs (job_id, output) VALUES (?, ?)")
                .bind(job_id)
                .bind(bytes)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            job.id = job_id,
            %status,
            output_bytes = output.map_or(0, <[u8]>::len),
            "completed job"
        );
        Ok(())
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<Job>, JobQueueError> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    pub async fn get_output(&self, job_id: i64) -> Result<Option<JobOutput>, JobQueueError> {
        let row = sqlx::query_as::<_, OutputRow>(
            "SELECT id, job_id, output FROM outputs WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(JobOutput::from))
    }

    /// Number of jobs currently in `status`.
    pub async fn count_by_status(&self, status: JobStatus) -> Result<i64, JobQueueError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
