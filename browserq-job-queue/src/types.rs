//! Core types for the job queue system.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::JobQueueError;

/// Structured input handed verbatim to a job factory.
pub type JobInput = Map<String, Value>;

/// Format SQLite produces for `strftime('%Y-%m-%d %H:%M:%f', 'now')`.
pub(crate) const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Lifecycle status of a job.
///
/// Transitions only move forward: `Pending -> InProgress -> {Done, Failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Value persisted in the `status` column.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

/// A unit of work stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub input: JobInput,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub worker: Option<String>,
}

/// Output produced by a successfully completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub id: i64,
    pub job_id: i64,
    pub output: Option<Vec<u8>>,
}

/// Raw `jobs` row as SQLite returns it.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub name: String,
    pub input: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub worker: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobQueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |reason: String| JobQueueError::Corrupt { id, reason };

        let input = match serde_json::from_str::<Value>(&row.input) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(corrupt(format!("input is not an object: {other}"))),
            Err(e) => return Err(corrupt(format!("input is not valid JSON: {e}"))),
        };
        let status = row.status.parse::<JobStatus>().map_err(corrupt)?;
        let created_at = parse_timestamp(&row.created_at).map_err(corrupt)?;
        let updated_at = row
            .updated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;

        Ok(Self {
            id: row.id,
            name: row.name,
            input,
            status,
            created_at,
            updated_at,
            worker: row.worker,
        })
    }
}

/// Raw `outputs` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OutputRow {
    pub id: i64,
    pub job_id: i64,
    pub output: Option<Vec<u8>>,
}

impl From<OutputRow> for JobOutput {
    #[inline]
    fn from(row: OutputRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            output: row.output,
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, input: &str) -> JobRow {
        JobRow {
            id: 7,
            name: "noop".into(),
            input: input.into(),
            status: status.into(),
            created_at: "2024-01-01 10:00:00.250".into(),
            updated_at: None,
            worker: None,
        }
    }

    #[test]
    fn test_status_round_trips_through_column_value() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_row_conversion_parses_millisecond_timestamps() {
        let job = Job::try_from(row("pending", r#"{"url":"https://example.com"}"#)).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.input["url"], "https://example.com");
        assert_eq!(job.created_at.timestamp_subsec_millis(), 250);
        assert!(job.updated_at.is_none());
    }

    #[test]
    fn test_row_conversion_rejects_non_object_input() {
        let err = Job::try_from(row("pending", "[1, 2]")).unwrap_err();
        assert!(matches!(err, JobQueueError::Corrupt { id: 7, .. }));
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let err = Job::try_from(row("paused", "{}")).unwrap_err();
        assert!(matches!(err, JobQueueError::Corrupt { .. }));
    }
}
