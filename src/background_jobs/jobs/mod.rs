//! Specific background job implementations.

pub mod dakara_sync;
pub mod upstream_refresh;

pub use dakara_sync::{DakaraSyncJob, DAKARA_SYNC_JOB_ID};
pub use upstream_refresh::{UpstreamRefreshJob, UPSTREAM_REFRESH_JOB_ID};
