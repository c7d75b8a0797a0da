//! No-op job.

use browserq_job_queue::{async_trait, JobError, JobExecutor, Page};
use serde::Deserialize;
use tracing::debug;

/// Input for `noop` jobs.
///
/// Does not touch the page. When `output` is set it is returned verbatim,
/// which makes the job handy for smoke-testing a deployment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoopJob {
    #[serde(default)]
    pub output: Option<String>,
}

#[async_trait]
impl JobExecutor for NoopJob {
    async fn execute(&self, _page: &dyn Page) -> Result<Option<Vec<u8>>, JobError> {
        debug!(has_output = self.output.is_some(), "executing noop job");
        Ok(self.output.as_ref().map(|s| s.as_bytes().to_vec()))
    }
}
