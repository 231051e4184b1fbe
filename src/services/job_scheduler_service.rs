use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::errors::AppError;
use crate::external::opportunity_sink::OpportunityStore;
use crate::jobs::{metrics_cleanup_job, portfolio_refresh_job};
use crate::services::health_monitor::ApiHealthMonitor;
use crate::services::opportunity_mapper::OpportunityMapper;
use crate::services::rate_controller::RateBudgetController;

/// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub rate: Arc<RateBudgetController>,
    pub monitor: Arc<ApiHealthMonitor>,
    pub mapper: Arc<OpportunityMapper>,
    pub opportunities: Arc<OpportunityStore>,
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

/// One finished run, kept in the in-memory run log for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub job_name: &'static str,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub success: bool,
    pub items_processed: i32,
    pub items_failed: i32,
    pub error: Option<String>,
}

const RUN_LOG_CAPACITY: usize = 100;

#[derive(Default)]
pub struct JobRunLog {
    runs: Mutex<Vec<JobRun>>,
}

impl JobRunLog {
    pub fn record(&self, run: JobRun) {
        let mut runs = self.runs.lock();
        runs.push(run);
        let overflow = runs.len().saturating_sub(RUN_LOG_CAPACITY);
        if overflow > 0 {
            runs.drain(..overflow);
        }
    }

    pub fn recent(&self) -> Vec<JobRun> {
        self.runs.lock().clone()
    }
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
    run_log: Arc<JobRunLog>,
}

impl JobSchedulerService {
    pub async fn new(context: JobContext) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context,
            run_log: Arc::new(JobRunLog::default()),
        })
    }

    pub fn run_log(&self) -> Arc<JobRunLog> {
        self.run_log.clone()
    }

    /// Start all scheduled maintenance jobs
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        // format: sec min hour day month weekday
        self.schedule_job(
            "0 */15 * * * *",
            "evict_stale_metrics",
            "Every 15 minutes",
            metrics_cleanup_job::evict_stale_metrics,
        )
        .await?;

        self.schedule_job(
            "0 */5 * * * *",
            "refresh_portfolio",
            "Every 5 minutes",
            portfolio_refresh_job::refresh_portfolio,
        )
        .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started with 2 jobs");
        Ok(())
    }

    /// Stop the scheduler gracefully
    #[allow(dead_code)]
    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        Ok(())
    }

    /// Helper to schedule a job with run tracking
    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let run_log = self.run_log.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let run_log = run_log.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(&run_log, job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

async fn execute_job_with_tracking<F, Fut>(
    run_log: &JobRunLog,
    job_name: &'static str,
    context: JobContext,
    job_fn: Arc<F>,
) where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );
            run_log.record(JobRun {
                job_name,
                started_at,
                duration_ms,
                success: true,
                items_processed: job_result.items_processed,
                items_failed: job_result.items_failed,
                error: None,
            });
        }
        Err(e) => {
            error!("❌ Job failed: {} - {}", job_name, e);
            run_log.record(JobRun {
                job_name,
                started_at,
                duration_ms,
                success: false,
                items_processed: 0,
                items_failed: 0,
                error: Some(e.to_string()),
            });
        }
    }
}
