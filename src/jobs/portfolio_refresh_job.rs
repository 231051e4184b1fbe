use tracing::info;

use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// Reselect the bounded, diversified portfolio from the latest
/// opportunity per keyword. Selection only reads the store; the chosen
/// set is logged for the operator and served by the status API on
/// demand.
pub async fn refresh_portfolio(ctx: JobContext) -> Result<JobResult, AppError> {
    let opportunities = ctx.opportunities.all();
    if opportunities.is_empty() {
        info!("📭 No opportunities yet, skipping portfolio refresh");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let config = ctx.mapper.config().clone();
    let selected = ctx.mapper.select_portfolio(
        &opportunities,
        config.max_positions,
        config.max_sector_exposure_pct,
    );

    for opportunity in &selected {
        info!(
            "📌 Portfolio pick: {} {} ({:.1}%, {} sector)",
            opportunity.recommended_action,
            opportunity.symbols.join("/"),
            opportunity.position_size_pct,
            opportunity.sector
        );
    }

    Ok(JobResult {
        items_processed: selected.len() as i32,
        items_failed: 0,
    })
}
