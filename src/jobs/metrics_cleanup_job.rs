use tracing::info;

use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// Drop health metrics and rate-window entries that have aged past
/// their retention. Both stores also evict lazily on write; this job
/// bounds memory for APIs that have gone quiet.
pub async fn evict_stale_metrics(ctx: JobContext) -> Result<JobResult, AppError> {
    let metrics_evicted = ctx.monitor.evict_expired();
    let records_evicted = ctx.rate.evict_expired();

    info!(
        "🧹 Evicted {} stale health metrics and {} stale rate records",
        metrics_evicted, records_evicted
    );

    Ok(JobResult {
        items_processed: (metrics_evicted + records_evicted) as i32,
        items_failed: 0,
    })
}
