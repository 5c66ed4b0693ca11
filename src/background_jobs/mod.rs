//! Background job scheduling and execution system.
//!
//! Jobs run either on an interval, in response to hook events, or when
//! triggered through a [`SchedulerHandle`]. A job is never run twice
//! concurrently: triggers that arrive while it is running are rejected.

mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobRunStatus, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobScheduler};
