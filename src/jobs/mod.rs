//! Background jobs scheduled by the job scheduler service. Jobs are
//! idempotent, contain their own failures, and log enough to be
//! monitored from the run log.

pub mod metrics_cleanup_job;
pub mod portfolio_refresh_job;
