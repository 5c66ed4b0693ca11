//! Periodic export of the publishable catalog to Dakara.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::export::ExportReconciler;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DAKARA_SYNC_JOB_ID: &str = "dakara_sync";

/// Runs one export sweep on startup and then every `interval`.
///
/// The sweep receives the job's cancellation token, so shutdown interrupts
/// it between remote calls.
pub struct DakaraSyncJob {
    reconciler: Arc<ExportReconciler>,
    interval: Duration,
}

impl DakaraSyncJob {
    pub fn new(reconciler: Arc<ExportReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }
}

#[async_trait]
impl BackgroundJob for DakaraSyncJob {
    fn id(&self) -> &'static str {
        DAKARA_SYNC_JOB_ID
    }

    fn name(&self) -> &'static str {
        "Dakara Sync"
    }

    fn description(&self) -> &'static str {
        "Pushes publishable karas to Dakara and prunes songs that are no longer publishable"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnStartup, HookEvent::OnSweepRequested],
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let report = self.reconciler.sweep(&ctx.cancellation_token).await?;
        info!(
            "Dakara sync ({}) finished: {} upserts, {} songs deleted, {} prune errors",
            ctx.triggered_by,
            report.upserts(),
            report.songs_deleted,
            report.prune_errors
        );
        Ok(())
    }
}
