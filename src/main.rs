use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use trendfolio::app;
use trendfolio::config::AppConfig;
use trendfolio::external::correlation_provider::StaticCorrelationProvider;
use trendfolio::external::opportunity_sink::{LoggingOpportunitySink, OpportunityStore};
use trendfolio::external::platform_fetcher::PlatformFetcher;
use trendfolio::external::simulated::SimulatedFetcher;
use trendfolio::logging::{self, LoggingConfig};
use trendfolio::services::analyzer::TrendAnalyzer;
use trendfolio::services::health_monitor::ApiHealthMonitor;
use trendfolio::services::job_scheduler_service::{JobContext, JobSchedulerService};
use trendfolio::services::opportunity_mapper::OpportunityMapper;
use trendfolio::services::rate_controller::RateBudgetController;
use trendfolio::state::AppState;
use trendfolio::stream::consumer::AnalysisConsumer;
use trendfolio::stream::coordinator::StreamCoordinator;
use trendfolio::stream::event_log::{EventLog, InMemoryEventLog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_logging(&LoggingConfig::from_env())?;

    let config = AppConfig::from_env();

    // Protection layer shared by every platform task.
    let rate = Arc::new(RateBudgetController::with_defaults());
    let monitor = Arc::new(ApiHealthMonitor::new(config.monitor.clone()));

    // The durable log decouples producers from the analysis consumer.
    let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());

    // Until real platform clients are wired in, synthesize signals.
    let fetcher: Arc<dyn PlatformFetcher> = Arc::new(SimulatedFetcher::default());

    let coordinator = Arc::new(StreamCoordinator::new(
        rate.clone(),
        monitor.clone(),
        log.clone(),
        fetcher,
    ));
    for platform_config in &config.platforms {
        coordinator.start(platform_config.clone()).await;
    }

    // Decisioning pipeline reading the log at its own pace.
    let analyzer = Arc::new(TrendAnalyzer::new());
    let mapper = Arc::new(OpportunityMapper::with_default_mappings(config.mapper.clone()));
    let opportunities = Arc::new(OpportunityStore::new());
    let consumer = AnalysisConsumer::new(
        "analysis",
        log.clone(),
        analyzer,
        Arc::new(StaticCorrelationProvider::empty()),
        mapper.clone(),
        Arc::new(LoggingOpportunitySink::new(opportunities.clone())),
    );
    let (_consumer_join, _consumer_shutdown) = consumer.spawn();

    // Scheduled maintenance: metric eviction and portfolio refresh.
    let mut scheduler = JobSchedulerService::new(JobContext {
        rate: rate.clone(),
        monitor: monitor.clone(),
        mapper: mapper.clone(),
        opportunities: opportunities.clone(),
    })
    .await?;
    let job_runs = scheduler.run_log();
    scheduler.start().await?;

    let state = AppState {
        coordinator,
        rate,
        monitor,
        mapper,
        opportunities,
        job_runs,
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Trendfolio running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
