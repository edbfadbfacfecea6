//! No-op handler used to exercise a worker end to end

use async_trait::async_trait;
use cluster_core::domain::job::Job;
use tracing::info;

use super::{HandlerOutcome, JobHandler};
use crate::config::Config;

pub struct TestJobHandler;

impl TestJobHandler {
    pub const JOB_TYPE: &'static str = "job-test";
}

#[async_trait]
impl JobHandler for TestJobHandler {
    async fn handle(&self, job: &Job, _config: &Config) -> HandlerOutcome {
        info!("[{}] Test job complete.", job.id());
        HandlerOutcome::Success
    }
}
