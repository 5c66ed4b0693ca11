use super::job::{BackgroundJob, JobError, JobSchedule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Information about a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
    pub next_run_at: Option<String>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<String>>,
}

impl From<JobSchedule> for JobScheduleInfo {
    fn from(schedule: JobSchedule) -> Self {
        match schedule {
            JobSchedule::Interval(duration) => JobScheduleInfo {
                schedule_type: "interval".to_string(),
                value_secs: Some(duration.as_secs()),
                hooks: None,
            },
            JobSchedule::Hook(event) => JobScheduleInfo {
                schedule_type: "hook".to_string(),
                hooks: Some(vec![event.to_string()]),
                value_secs: None,
            },
            JobSchedule::Combined { interval, hooks } => JobScheduleInfo {
                schedule_type: "combined".to_string(),
                value_secs: interval.map(|d| d.as_secs()),
                hooks: Some(hooks.iter().map(|h| h.to_string()).collect()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Running => "running",
            JobRunStatus::Completed => "completed",
            JobRunStatus::Failed => "failed",
            JobRunStatus::Cancelled => "cancelled",
        }
    }
}

/// A single execution of a job, kept in memory for the process lifetime.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

/// Serializable job run information.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

impl From<JobRun> for JobRunInfo {
    fn from(run: JobRun) -> Self {
        JobRunInfo {
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.map(|dt| dt.to_rfc3339()),
            status: run.status.as_str().to_string(),
            error_message: run.error_message,
            triggered_by: run.triggered_by,
        }
    }
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    TriggerJob {
        job_id: String,
        response: oneshot::Sender<Result<(), JobError>>,
    },
}

/// Shared state between scheduler and handle.
#[derive(Default)]
pub struct SharedJobState {
    /// Static job info (set at registration, never changes)
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Currently running job IDs
    pub running_jobs: HashSet<String>,
    /// Next interval run per job. Missing means "due now".
    pub next_runs: HashMap<String, DateTime<Utc>>,
    /// Most recent run per job
    pub last_runs: HashMap<String, JobRun>,
}

impl SharedJobState {
    fn job_info(&self, job_id: &str, job: &Arc<dyn BackgroundJob>) -> JobInfo {
        JobInfo {
            id: job_id.to_string(),
            name: job.name().to_string(),
            description: job.description().to_string(),
            schedule: job.schedule().into(),
            is_running: self.running_jobs.contains(job_id),
            last_run: self.last_runs.get(job_id).cloned().map(JobRunInfo::from),
            next_run_at: self.next_runs.get(job_id).map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Handle to interact with the job scheduler from the CLI and other tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Channel to send commands to the scheduler
    command_tx: mpsc::Sender<SchedulerCommand>,
    /// Shared state for reading job info
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    /// Get information about all registered jobs, sorted by ID.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .iter()
            .map(|(job_id, job)| state.job_info(job_id, job))
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn get_job(&self, job_id: &str) -> Option<JobInfo> {
        let state = self.shared_state.read().await;
        state.jobs.get(job_id).map(|job| state.job_info(job_id, job))
    }

    /// Trigger a job manually.
    ///
    /// Returns `AlreadyRunning` instead of queueing when the job is in flight.
    pub async fn trigger_job(&self, job_id: &str) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_id: job_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler did not respond".to_string()))?
    }

    /// Shorthand for [`SchedulerHandle::trigger_job`].
    pub async fn trigger(&self, job_id: &str) -> Result<(), JobError> {
        self.trigger_job(job_id).await
    }

    pub async fn is_job_running(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.running_jobs.contains(job_id)
    }

    pub async fn job_exists(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.jobs.contains_key(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::job::HookEvent;
    use std::time::Duration;

    #[test]
    fn test_job_schedule_info_from_interval() {
        let schedule = JobSchedule::Interval(Duration::from_secs(3600));
        let info: JobScheduleInfo = schedule.into();

        assert_eq!(info.schedule_type, "interval");
        assert_eq!(info.value_secs, Some(3600));
        assert!(info.hooks.is_none());
    }

    #[test]
    fn test_job_schedule_info_from_hook() {
        let schedule = JobSchedule::Hook(HookEvent::OnStartup);
        let info: JobScheduleInfo = schedule.into();

        assert_eq!(info.schedule_type, "hook");
        assert_eq!(info.hooks, Some(vec!["OnStartup".to_string()]));
        assert!(info.value_secs.is_none());
    }

    #[test]
    fn test_job_schedule_info_from_combined() {
        let schedule = JobSchedule::Combined {
            interval: Some(Duration::from_secs(1800)),
            hooks: vec![HookEvent::OnStartup, HookEvent::OnSweepRequested],
        };
        let info: JobScheduleInfo = schedule.into();

        assert_eq!(info.schedule_type, "combined");
        assert_eq!(info.value_secs, Some(1800));
        let hooks = info.hooks.unwrap();
        assert_eq!(hooks.len(), 2);
        assert!(hooks.contains(&"OnSweepRequested".to_string()));
    }

    #[test]
    fn test_job_run_info_from_failed() {
        let now = Utc::now();
        let run = JobRun {
            started_at: now,
            finished_at: Some(now + chrono::Duration::seconds(5)),
            status: JobRunStatus::Failed,
            error_message: Some("Something went wrong".to_string()),
            triggered_by: "schedule".to_string(),
        };

        let info: JobRunInfo = run.into();

        assert_eq!(info.status, "failed");
        assert_eq!(info.error_message, Some("Something went wrong".to_string()));
        assert_eq!(info.triggered_by, "schedule");
        // RFC3339
        assert!(info.started_at.contains('T'));
    }

    #[test]
    fn test_job_run_info_from_running() {
        let run = JobRun {
            started_at: Utc::now(),
            finished_at: None,
            status: JobRunStatus::Running,
            error_message: None,
            triggered_by: "hook:OnStartup".to_string(),
        };

        let info: JobRunInfo = run.into();

        assert_eq!(info.status, "running");
        assert!(info.finished_at.is_none());
    }
}
