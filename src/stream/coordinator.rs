use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PlatformConfig;
use crate::external::platform_fetcher::PlatformFetcher;
use crate::models::Platform;
use crate::services::health_monitor::ApiHealthMonitor;
use crate::services::rate_controller::{RateBudgetController, RequestPriority};
use crate::stream::event_log::EventLog;

/// Rolling latency window per platform task.
const LATENCY_WINDOW: usize = 50;

#[derive(Debug, Default)]
struct StreamStats {
    last_update: Option<DateTime<Utc>>,
    signals_processed: u64,
    error_count: u64,
    latencies_ms: VecDeque<f64>,
}

impl StreamStats {
    fn record_latency(&mut self, latency_ms: f64) {
        self.latencies_ms.push_back(latency_ms);
        while self.latencies_ms.len() > LATENCY_WINDOW {
            self.latencies_ms.pop_front();
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
    }
}

/// One row of `status()`, backing the operational dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStreamStatus {
    pub platform: Platform,
    pub running: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub signals_processed: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub health_score: f64,
}

struct PlatformHandle {
    shutdown: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<Mutex<StreamStats>>,
}

/// Owns one concurrent fetch task per enabled platform. Each task polls
/// on its platform's interval, asks the rate/budget controller for
/// admission and the health monitor for breaker availability, performs
/// the externally supplied fetch under a timeout, and publishes every
/// validated signal as a single atomic log append. Failures stay inside
/// the task: logged, counted, backed off. Publishes are at-least-once.
pub struct StreamCoordinator {
    rate: Arc<RateBudgetController>,
    monitor: Arc<ApiHealthMonitor>,
    log: Arc<dyn EventLog>,
    fetcher: Arc<dyn PlatformFetcher>,
    platforms: DashMap<Platform, PlatformHandle>,
}

impl StreamCoordinator {
    pub fn new(
        rate: Arc<RateBudgetController>,
        monitor: Arc<ApiHealthMonitor>,
        log: Arc<dyn EventLog>,
        fetcher: Arc<dyn PlatformFetcher>,
    ) -> Self {
        Self {
            rate,
            monitor,
            log,
            fetcher,
            platforms: DashMap::new(),
        }
    }

    /// Begin streaming one platform. Starting an already-running
    /// platform restarts it with the new config.
    pub async fn start(&self, config: PlatformConfig) {
        let platform = config.platform;
        self.stop(platform).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(StreamStats::default()));

        let task_stats = stats.clone();
        let rate = self.rate.clone();
        let monitor = self.monitor.clone();
        let log = self.log.clone();
        let fetcher = self.fetcher.clone();

        info!(
            "🚀 [STREAM] starting {} ({} keywords, every {:?})",
            platform,
            config.keywords.len(),
            config.poll_interval
        );

        let join = tokio::spawn(async move {
            platform_loop(config, rate, monitor, log, fetcher, task_stats, shutdown_rx).await;
        });

        self.platforms.insert(
            platform,
            PlatformHandle {
                shutdown: shutdown_tx,
                join: Mutex::new(Some(join)),
                stats,
            },
        );
    }

    /// Stop one platform's task cooperatively: any in-flight
    /// fetch/publish cycle completes before the task exits, so no
    /// signal is lost or half-published.
    pub async fn stop(&self, platform: Platform) {
        let handle = match self.platforms.remove(&platform) {
            Some((_, handle)) => handle,
            None => return,
        };

        let _ = handle.shutdown.send(true);
        let join = handle.join.lock().take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                error!("💥 [STREAM] {} task panicked on shutdown: {}", platform, e);
            }
        }
        info!("🛑 [STREAM] stopped {}", platform);
    }

    pub async fn stop_all(&self) {
        let platforms: Vec<Platform> = self.platforms.iter().map(|e| *e.key()).collect();
        futures::future::join_all(platforms.into_iter().map(|p| self.stop(p))).await;
    }

    /// Per-platform snapshot for the status surface. Reflects the
    /// latest known state even when a platform is degraded or stopped.
    pub fn status(&self) -> Vec<PlatformStreamStatus> {
        let mut statuses: Vec<PlatformStreamStatus> = self
            .platforms
            .iter()
            .map(|entry| {
                let stats = entry.stats.lock();
                let running = entry
                    .join
                    .lock()
                    .as_ref()
                    .map(|j| !j.is_finished())
                    .unwrap_or(false);
                PlatformStreamStatus {
                    platform: *entry.key(),
                    running,
                    last_update: stats.last_update,
                    signals_processed: stats.signals_processed,
                    error_count: stats.error_count,
                    avg_latency_ms: stats.avg_latency_ms(),
                    health_score: self.monitor.health_score(*entry.key()),
                }
            })
            .collect();
        statuses.sort_by_key(|s| s.platform.to_string());
        statuses
    }
}

#[allow(clippy::too_many_arguments)]
async fn platform_loop(
    config: PlatformConfig,
    rate: Arc<RateBudgetController>,
    monitor: Arc<ApiHealthMonitor>,
    log: Arc<dyn EventLog>,
    fetcher: Arc<dyn PlatformFetcher>,
    stats: Arc<Mutex<StreamStats>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let platform = config.platform;
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        // Breaker open: skip this cycle, not a fatal condition.
        if !monitor.is_available(platform) {
            debug!("⚡ [STREAM] {} breaker open, skipping cycle", platform);
            continue;
        }

        // Admission denial is a "retry later", never an error.
        if !rate.can_make_request(platform, RequestPriority::Normal) {
            let backoff = rate.calculate_backoff(platform);
            debug!("⏳ [STREAM] {} over budget, backing off {:?}", platform, backoff);
            if backoff > std::time::Duration::ZERO {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            continue;
        }

        let started = std::time::Instant::now();
        let outcome =
            tokio::time::timeout(config.fetch_timeout, fetcher.fetch_trends(platform, &config.keywords))
                .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;

        match outcome {
            Ok(Ok(signals)) => {
                let mut published = 0u64;
                for signal in &signals {
                    match log.append(signal) {
                        Ok(_) => published += 1,
                        Err(e) => warn!("⚠️ [STREAM] {} dropped unpublishable signal: {}", platform, e),
                    }
                }

                rate.record_request(platform, true);
                monitor.record_request(platform, latency_ms, true, None);

                let mut stats = stats.lock();
                stats.last_update = Some(Utc::now());
                stats.signals_processed += published;
                stats.record_latency(latency_ms);
                debug!(
                    "📡 [STREAM] {} published {} signals ({:.0}ms)",
                    platform, published, latency_ms
                );
            }
            Ok(Err(e)) => {
                rate.record_request(platform, false);
                monitor.record_request(platform, latency_ms, false, Some(e.to_string()));
                {
                    let mut stats = stats.lock();
                    stats.error_count += 1;
                    stats.record_latency(latency_ms);
                }
                warn!("❌ [STREAM] {} fetch failed: {}, backing off {:?}", platform, e, config.error_backoff);
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(config.error_backoff) => {}
                }
            }
            Err(_) => {
                // A timeout counts as a failure for breaker purposes.
                rate.record_request(platform, false);
                monitor.record_request(
                    platform,
                    latency_ms,
                    false,
                    Some("fetch timeout".to_string()),
                );
                {
                    let mut stats = stats.lock();
                    stats.error_count += 1;
                    stats.record_latency(latency_ms);
                }
                warn!(
                    "⏱️ [STREAM] {} fetch timed out after {:?}, backing off",
                    platform, config.fetch_timeout
                );
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(config.error_backoff) => {}
                }
            }
        }
    }

    debug!("👋 [STREAM] {} task exiting", platform);
}
