/// End-to-end pipeline scenarios:
///
/// - A 5-day, strictly rising history for "artificial intelligence"
///   flowing log → consumer → analyzer → mapper must classify the trend
///   as growing (peak at the boundary), score it above 0.5, and surface
///   a technology-sector opportunity.
/// - An API suffering 5 consecutive timeouts, then a recovery wait and
///   one successful probe, must end with a closed breaker and a reset
///   failure counter.
/// - The stream coordinator must keep publishing through the protection
///   layer and report accurate status rows.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use trendfolio::config::{MapperConfig, MonitorConfig, PlatformConfig};
use trendfolio::external::correlation_provider::StaticCorrelationProvider;
use trendfolio::external::opportunity_sink::{LoggingOpportunitySink, OpportunityStore};
use trendfolio::external::platform_fetcher::{FetchError, PlatformFetcher};
use trendfolio::models::{LifecycleStage, Platform, TrendSignal};
use trendfolio::services::analyzer::TrendAnalyzer;
use trendfolio::services::health_monitor::{ApiHealthMonitor, CircuitState};
use trendfolio::services::opportunity_mapper::OpportunityMapper;
use trendfolio::services::rate_controller::RateBudgetController;
use trendfolio::stream::consumer::AnalysisConsumer;
use trendfolio::stream::coordinator::StreamCoordinator;
use trendfolio::stream::event_log::{EventLog, InMemoryEventLog};

fn rising_ai_signal(i: usize) -> TrendSignal {
    let start = Utc::now() - chrono::Duration::days(5);
    TrendSignal::new(
        Platform::GoogleTrends,
        "artificial intelligence",
        0.5 + 0.07 * i as f64,
        0.9,
        1_000 + 1_000 * i as u64,
        start + chrono::Duration::days(1) * i as i32,
        LifecycleStage::Emerging,
        vec!["US".to_string()],
        vec!["machine learning".to_string()],
    )
    .unwrap()
}

#[tokio::test]
async fn test_rising_ai_trend_yields_technology_opportunity() {
    let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
    for i in 0..6 {
        log.append(&rising_ai_signal(i)).unwrap();
    }

    let analyzer = Arc::new(TrendAnalyzer::new());
    let store = Arc::new(OpportunityStore::new());
    let consumer = AnalysisConsumer::new(
        "analysis",
        log.clone(),
        analyzer.clone(),
        Arc::new(StaticCorrelationProvider::empty()),
        Arc::new(OpportunityMapper::with_default_mappings(MapperConfig::default())),
        Arc::new(LoggingOpportunitySink::new(store.clone())),
    );
    let (join, shutdown) = consumer.spawn();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let _ = shutdown.send(true);
    join.await.unwrap();

    let analysis = analyzer.analyze("artificial intelligence").unwrap();
    assert!(
        matches!(
            analysis.lifecycle_stage,
            LifecycleStage::Growing | LifecycleStage::Peak
        ),
        "expected growing/peak, got {}",
        analysis.lifecycle_stage
    );
    assert!(
        analysis.investment_score > 0.5,
        "investment score {:.2} too low",
        analysis.investment_score
    );

    let opportunities = store.all();
    assert!(!opportunities.is_empty(), "expected at least one opportunity");
    let opportunity = &opportunities[0];
    assert_eq!(opportunity.sector, "technology");
    let tech_tickers = ["NVDA", "MSFT", "GOOGL", "AIQ"];
    assert!(
        opportunity
            .symbols
            .iter()
            .any(|s| tech_tickers.contains(&s.as_str())),
        "no technology ticker in {:?}",
        opportunity.symbols
    );

    // Risk-sizing invariants hold end to end.
    assert!(opportunity.position_size_pct <= 10.0);
    assert!((5.0..=50.0).contains(&opportunity.stop_loss_pct));
    assert!((-50.0..=100.0).contains(&opportunity.expected_return_pct));
}

#[tokio::test]
async fn test_timeouts_then_probe_close_breaker_and_reset_failures() {
    // Same semantics as the production 60s timeout, compressed so the
    // test can actually wait through a recovery window.
    let monitor = ApiHealthMonitor::new(MonitorConfig {
        failure_threshold: 5,
        recovery_timeout: Duration::from_millis(200),
        metric_retention: chrono::Duration::hours(24),
    });

    for _ in 0..5 {
        monitor.record_request(
            Platform::Twitter,
            10_000.0,
            false,
            Some("fetch timeout".to_string()),
        );
    }
    assert_eq!(monitor.circuit_state(Platform::Twitter), CircuitState::Open);
    assert!(!monitor.is_available(Platform::Twitter));

    // Wait out the recovery timeout, then probe.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(monitor.is_available(Platform::Twitter));
    assert_eq!(monitor.circuit_state(Platform::Twitter), CircuitState::HalfOpen);

    monitor.record_request(Platform::Twitter, 120.0, true, None);

    assert_eq!(monitor.circuit_state(Platform::Twitter), CircuitState::Closed);
    assert_eq!(monitor.failure_count(Platform::Twitter), 0);
}

struct GrowingFetcher;

#[async_trait]
impl PlatformFetcher for GrowingFetcher {
    async fn fetch_trends(
        &self,
        platform: Platform,
        keywords: &[String],
    ) -> Result<Vec<TrendSignal>, FetchError> {
        Ok(keywords
            .iter()
            .map(|k| {
                TrendSignal::new(
                    platform,
                    k.clone(),
                    0.7,
                    0.9,
                    4_000,
                    Utc::now(),
                    LifecycleStage::Emerging,
                    vec!["US".to_string()],
                    vec![],
                )
                .unwrap()
            })
            .collect())
    }
}

#[tokio::test]
async fn test_coordinator_to_consumer_flow_produces_opportunities() {
    let rate = Arc::new(RateBudgetController::with_defaults());
    let monitor = Arc::new(ApiHealthMonitor::new(MonitorConfig::default()));
    let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());

    let coordinator = StreamCoordinator::new(
        rate.clone(),
        monitor.clone(),
        log.clone(),
        Arc::new(GrowingFetcher),
    );

    let store = Arc::new(OpportunityStore::new());
    let consumer = AnalysisConsumer::new(
        "analysis",
        log.clone(),
        Arc::new(TrendAnalyzer::new()),
        Arc::new(StaticCorrelationProvider::empty()),
        Arc::new(OpportunityMapper::with_default_mappings(MapperConfig::default())),
        Arc::new(LoggingOpportunitySink::new(store.clone())),
    );
    let (join, shutdown) = consumer.spawn();

    coordinator
        .start(PlatformConfig {
            platform: Platform::GoogleTrends,
            keywords: vec!["artificial intelligence".to_string()],
            poll_interval: Duration::from_millis(30),
            fetch_timeout: Duration::from_millis(500),
            error_backoff: Duration::from_millis(20),
        })
        .await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    coordinator.stop(Platform::GoogleTrends).await;
    let _ = shutdown.send(true);
    join.await.unwrap();

    // Signals flowed through admission to the log and on to decisions.
    assert!(log.len() >= 2, "log only has {} entries", log.len());
    assert!(!store.is_empty(), "no opportunities were produced");
    assert_eq!(store.all()[0].sector, "technology");

    // Protection layer observed the traffic.
    let quota = rate.remaining_quota(Platform::GoogleTrends).unwrap();
    assert!(quota.day_remaining < 1_000);
    let summary = monitor.health_summary(Platform::GoogleTrends).unwrap();
    assert!(summary.last_hour.request_count >= 2);
    assert!(summary.health_score > 0.8);
}

#[tokio::test]
async fn test_status_surface_reflects_degraded_platform() {
    struct BrokenFetcher;

    #[async_trait]
    impl PlatformFetcher for BrokenFetcher {
        async fn fetch_trends(
            &self,
            _platform: Platform,
            _keywords: &[String],
        ) -> Result<Vec<TrendSignal>, FetchError> {
            Err(FetchError::Unavailable("integration outage".to_string()))
        }
    }

    let rate = Arc::new(RateBudgetController::with_defaults());
    let monitor = Arc::new(ApiHealthMonitor::new(MonitorConfig::default()));
    let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
    let coordinator =
        StreamCoordinator::new(rate, monitor, log, Arc::new(BrokenFetcher));

    coordinator
        .start(PlatformConfig {
            platform: Platform::Tiktok,
            keywords: vec!["ai".to_string()],
            poll_interval: Duration::from_millis(30),
            fetch_timeout: Duration::from_millis(200),
            error_backoff: Duration::from_millis(10),
        })
        .await;

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Status always answers, even mid-degradation.
    let status = coordinator.status();
    assert_eq!(status.len(), 1);
    assert!(status[0].running);
    assert!(status[0].error_count >= 1);
    assert_eq!(status[0].signals_processed, 0);

    coordinator.stop(Platform::Tiktok).await;
}
