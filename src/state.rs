use std::sync::Arc;

use crate::external::opportunity_sink::OpportunityStore;
use crate::services::health_monitor::ApiHealthMonitor;
use crate::services::job_scheduler_service::JobRunLog;
use crate::services::opportunity_mapper::OpportunityMapper;
use crate::services::rate_controller::RateBudgetController;
use crate::stream::coordinator::StreamCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<StreamCoordinator>,
    pub rate: Arc<RateBudgetController>,
    pub monitor: Arc<ApiHealthMonitor>,
    pub mapper: Arc<OpportunityMapper>,
    pub opportunities: Arc<OpportunityStore>,
    pub job_runs: Arc<JobRunLog>,
}
