//! Periodic refresh of imported karas against Kara.moe.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::import::ImportReconciler;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const UPSTREAM_REFRESH_JOB_ID: &str = "upstream_refresh";

pub struct UpstreamRefreshJob {
    importer: Arc<ImportReconciler>,
    interval: Duration,
}

impl UpstreamRefreshJob {
    pub fn new(importer: Arc<ImportReconciler>, interval: Duration) -> Self {
        Self { importer, interval }
    }
}

#[async_trait]
impl BackgroundJob for UpstreamRefreshJob {
    fn id(&self) -> &'static str {
        UPSTREAM_REFRESH_JOB_ID
    }

    fn name(&self) -> &'static str {
        "Upstream Refresh"
    }

    fn description(&self) -> &'static str {
        "Updates the metadata of every imported kara and re-downloads stale video and subtitle files"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let summary = self.importer.refresh_all(&ctx.cancellation_token).await?;
        if summary.failed > 0 {
            return Err(JobError::ExecutionFailed(format!(
                "{} of {} karas failed to refresh",
                summary.failed, summary.total
            )));
        }
        info!(
            "Upstream refresh finished: {} karas, {} updated, {} downloaded",
            summary.total, summary.metadata_updated, summary.downloaded
        );
        Ok(())
    }
}
