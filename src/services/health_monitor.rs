use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::models::Platform;

/// Circuit breaker state for one external API
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    #[serde(rename = "closed")]
    Closed,

    /// Too many consecutive failures; calls are refused
    #[serde(rename = "open")]
    Open,

    /// Recovery timeout elapsed; exactly one probing call is allowed
    #[serde(rename = "half_open")]
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Bucketed health classification derived from the weighted score
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum HealthStatus {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "degraded")]
    Degraded,
    #[serde(rename = "unhealthy")]
    Unhealthy,
    #[serde(rename = "down")]
    Down,
}

#[derive(Debug, Clone)]
struct ApiMetric {
    timestamp: DateTime<Utc>,
    latency_ms: f64,
    success: bool,
    #[allow(dead_code)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            opened_at: None,
        }
    }
}

struct ApiHealth {
    breaker: BreakerState,
    metrics: VecDeque<ApiMetric>,
}

/// Windowed statistics for one API over the requested window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowStats {
    pub window_hours: i64,
    pub request_count: usize,
    pub success_rate: f64,
    /// Mean latency of successful requests, milliseconds
    pub mean_latency_ms: f64,
    /// 95th percentile latency of successful requests, milliseconds
    pub p95_latency_ms: f64,
    pub error_count: usize,
    /// Share of 5-minute buckets with traffic that saw a success
    pub uptime_pct: f64,
}

/// Full health picture for one API, backing the status dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ApiHealthSummary {
    pub api: Platform,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_hour: WindowStats,
    pub last_day: WindowStats,
    /// Weighted blend of success rate, latency and error rate, [0,1]
    pub health_score: f64,
    pub status: HealthStatus,
}

/// Tracks per-API request outcomes and drives a circuit breaker per
/// API: Closed opens after 5 consecutive failures, Open moves to
/// HalfOpen once the recovery timeout has elapsed (observed at the next
/// availability check), HalfOpen closes on a success and reopens on a
/// single failure.
pub struct ApiHealthMonitor {
    config: MonitorConfig,
    apis: DashMap<Platform, Mutex<ApiHealth>>,
}

impl ApiHealthMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let apis = DashMap::new();
        for &platform in Platform::all() {
            apis.insert(
                platform,
                Mutex::new(ApiHealth {
                    breaker: BreakerState::new(),
                    metrics: VecDeque::new(),
                }),
            );
        }
        Self { config, apis }
    }

    /// Record one request outcome and drive the breaker state machine.
    pub fn record_request(
        &self,
        api: Platform,
        latency_ms: f64,
        success: bool,
        error: Option<String>,
    ) {
        let entry = match self.apis.get(&api) {
            Some(e) => e,
            None => return,
        };
        let mut health = entry.lock();
        let now = Utc::now();

        health.metrics.push_back(ApiMetric {
            timestamp: now,
            latency_ms,
            success,
            error,
        });

        // Lazy eviction past the retention window.
        let cutoff = now - self.config.metric_retention;
        while health
            .metrics
            .front()
            .map(|m| m.timestamp < cutoff)
            .unwrap_or(false)
        {
            health.metrics.pop_front();
        }

        if success {
            match health.breaker.state {
                CircuitState::HalfOpen => {
                    info!("✅ [BREAKER] {} probe succeeded, closing circuit", api);
                    health.breaker.state = CircuitState::Closed;
                    health.breaker.failure_count = 0;
                    health.breaker.opened_at = None;
                }
                CircuitState::Closed => {
                    health.breaker.failure_count = 0;
                }
                CircuitState::Open => {
                    // A success while Open means the caller bypassed
                    // availability; count it as recovery evidence but
                    // keep the breaker timing intact.
                }
            }
        } else {
            health.breaker.last_failure_time = Some(now);
            match health.breaker.state {
                CircuitState::HalfOpen => {
                    warn!("⚡ [BREAKER] {} probe failed, reopening circuit", api);
                    health.breaker.state = CircuitState::Open;
                    health.breaker.opened_at = Some(now);
                }
                CircuitState::Closed => {
                    health.breaker.failure_count += 1;
                    if health.breaker.failure_count >= self.config.failure_threshold {
                        warn!(
                            "⚡ [BREAKER] {} opened after {} consecutive failures",
                            api, health.breaker.failure_count
                        );
                        health.breaker.state = CircuitState::Open;
                        health.breaker.opened_at = Some(now);
                    }
                }
                CircuitState::Open => {}
            }
        }
    }

    /// True iff the breaker is Closed or HalfOpen. Checking an Open
    /// breaker whose recovery timeout has elapsed transitions it to
    /// HalfOpen, which permits exactly one probing call.
    pub fn is_available(&self, api: Platform) -> bool {
        let entry = match self.apis.get(&api) {
            Some(e) => e,
            None => return false,
        };
        let mut health = entry.lock();

        if health.breaker.state == CircuitState::Open {
            let elapsed = health
                .breaker
                .opened_at
                .map(|t| Utc::now() - t)
                .unwrap_or_else(chrono::Duration::zero);
            let recovery =
                chrono::Duration::from_std(self.config.recovery_timeout).unwrap_or_else(|_| chrono::Duration::seconds(60));
            if elapsed >= recovery {
                info!("🔄 [BREAKER] {} recovery timeout elapsed, half-opening", api);
                health.breaker.state = CircuitState::HalfOpen;
            }
        }

        matches!(health.breaker.state, CircuitState::Closed | CircuitState::HalfOpen)
    }

    pub fn circuit_state(&self, api: Platform) -> CircuitState {
        self.apis
            .get(&api)
            .map(|e| e.lock().breaker.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn failure_count(&self, api: Platform) -> u32 {
        self.apis
            .get(&api)
            .map(|e| e.lock().breaker.failure_count)
            .unwrap_or(0)
    }

    /// Combined windowed statistics and weighted health score for one
    /// API. Success rate weighs 40%, latency 30%, error rate 30%.
    pub fn health_summary(&self, api: Platform) -> Option<ApiHealthSummary> {
        let entry = self.apis.get(&api)?;
        let health = entry.lock();
        let now = Utc::now();

        let last_hour = window_stats(&health.metrics, now, chrono::Duration::hours(1));
        let last_day = window_stats(&health.metrics, now, chrono::Duration::hours(24));

        let health_score = weighted_health_score(&last_hour);
        let status = if health.breaker.state == CircuitState::Open {
            HealthStatus::Down
        } else if health_score >= 0.8 {
            HealthStatus::Healthy
        } else if health_score >= 0.5 {
            HealthStatus::Degraded
        } else if health_score > 0.2 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Down
        };

        Some(ApiHealthSummary {
            api,
            circuit_state: health.breaker.state,
            failure_count: health.breaker.failure_count,
            last_failure_time: health.breaker.last_failure_time,
            last_hour,
            last_day,
            health_score,
            status,
        })
    }

    /// Health score alone, for the coordinator's status rows.
    pub fn health_score(&self, api: Platform) -> f64 {
        self.health_summary(api).map(|s| s.health_score).unwrap_or(1.0)
    }

    pub fn all_summaries(&self) -> Vec<ApiHealthSummary> {
        let mut summaries: Vec<ApiHealthSummary> = Platform::all()
            .iter()
            .filter_map(|&p| self.health_summary(p))
            .collect();
        summaries.sort_by_key(|s| s.api.to_string());
        summaries
    }

    /// Drop metrics past the retention window across all APIs. Called
    /// by the maintenance job; `record_request` also evicts lazily.
    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - self.config.metric_retention;
        let mut evicted = 0;
        for entry in self.apis.iter() {
            let mut health = entry.lock();
            while health
                .metrics
                .front()
                .map(|m| m.timestamp < cutoff)
                .unwrap_or(false)
            {
                health.metrics.pop_front();
                evicted += 1;
            }
        }
        evicted
    }

    #[cfg(test)]
    fn force_open_at(&self, api: Platform, opened_at: DateTime<Utc>) {
        if let Some(entry) = self.apis.get(&api) {
            let mut health = entry.lock();
            health.breaker.state = CircuitState::Open;
            health.breaker.opened_at = Some(opened_at);
        }
    }
}

fn window_stats(
    metrics: &VecDeque<ApiMetric>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> WindowStats {
    let cutoff = now - window;
    let in_window: Vec<&ApiMetric> = metrics.iter().filter(|m| m.timestamp >= cutoff).collect();

    let request_count = in_window.len();
    let error_count = in_window.iter().filter(|m| !m.success).count();
    let success_rate = if request_count == 0 {
        1.0
    } else {
        (request_count - error_count) as f64 / request_count as f64
    };

    let mut success_latencies: Vec<f64> = in_window
        .iter()
        .filter(|m| m.success)
        .map(|m| m.latency_ms)
        .collect();
    success_latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mean_latency_ms = if success_latencies.is_empty() {
        0.0
    } else {
        success_latencies.iter().sum::<f64>() / success_latencies.len() as f64
    };
    let p95_latency_ms = if success_latencies.is_empty() {
        0.0
    } else {
        let idx = ((success_latencies.len() as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(success_latencies.len() - 1);
        success_latencies[idx]
    };

    // Uptime: share of 5-minute buckets with traffic that saw at least
    // one success. Quiet buckets don't count against uptime.
    let bucket = chrono::Duration::minutes(5);
    let bucket_count = (window.num_minutes() / bucket.num_minutes()).max(1);
    let mut buckets_with_traffic = 0usize;
    let mut buckets_up = 0usize;
    for i in 0..bucket_count {
        let bucket_start = cutoff + bucket * i as i32;
        let bucket_end = bucket_start + bucket;
        let in_bucket: Vec<&&ApiMetric> = in_window
            .iter()
            .filter(|m| m.timestamp >= bucket_start && m.timestamp < bucket_end)
            .collect();
        if !in_bucket.is_empty() {
            buckets_with_traffic += 1;
            if in_bucket.iter().any(|m| m.success) {
                buckets_up += 1;
            }
        }
    }
    let uptime_pct = if buckets_with_traffic == 0 {
        100.0
    } else {
        buckets_up as f64 / buckets_with_traffic as f64 * 100.0
    };

    WindowStats {
        window_hours: window.num_hours(),
        request_count,
        success_rate,
        mean_latency_ms,
        p95_latency_ms,
        error_count,
        uptime_pct,
    }
}

fn weighted_health_score(stats: &WindowStats) -> f64 {
    // Sub-200ms is ideal; anything past 2s scores zero.
    let latency_score = if stats.mean_latency_ms <= 200.0 {
        1.0
    } else {
        (1.0 - (stats.mean_latency_ms - 200.0) / 1_800.0).max(0.0)
    };
    let error_rate = if stats.request_count == 0 {
        0.0
    } else {
        stats.error_count as f64 / stats.request_count as f64
    };

    (stats.success_rate * 0.4 + latency_score * 0.3 + (1.0 - error_rate) * 0.3).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> ApiHealthMonitor {
        ApiHealthMonitor::new(MonitorConfig::default())
    }

    #[test]
    fn test_breaker_opens_after_five_consecutive_failures() {
        let monitor = monitor();

        for i in 0..4 {
            monitor.record_request(Platform::Youtube, 100.0, false, Some("timeout".to_string()));
            assert_eq!(
                monitor.circuit_state(Platform::Youtube),
                CircuitState::Closed,
                "still closed after {} failures",
                i + 1
            );
        }

        monitor.record_request(Platform::Youtube, 100.0, false, Some("timeout".to_string()));
        assert_eq!(monitor.circuit_state(Platform::Youtube), CircuitState::Open);
        assert!(!monitor.is_available(Platform::Youtube));
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let monitor = monitor();

        for _ in 0..4 {
            monitor.record_request(Platform::Twitter, 100.0, false, None);
        }
        monitor.record_request(Platform::Twitter, 100.0, true, None);
        assert_eq!(monitor.failure_count(Platform::Twitter), 0);

        // Four more failures still don't open the breaker.
        for _ in 0..4 {
            monitor.record_request(Platform::Twitter, 100.0, false, None);
        }
        assert_eq!(monitor.circuit_state(Platform::Twitter), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_success_closes() {
        let monitor = monitor();
        monitor.force_open_at(Platform::Tiktok, Utc::now() - chrono::Duration::seconds(61));

        // Availability check promotes Open → HalfOpen after the timeout.
        assert!(monitor.is_available(Platform::Tiktok));
        assert_eq!(monitor.circuit_state(Platform::Tiktok), CircuitState::HalfOpen);

        monitor.record_request(Platform::Tiktok, 80.0, true, None);
        assert_eq!(monitor.circuit_state(Platform::Tiktok), CircuitState::Closed);
        assert_eq!(monitor.failure_count(Platform::Tiktok), 0);
    }

    #[test]
    fn test_half_open_failure_reopens_immediately() {
        let monitor = monitor();
        monitor.force_open_at(Platform::Tiktok, Utc::now() - chrono::Duration::seconds(61));
        assert!(monitor.is_available(Platform::Tiktok));

        monitor.record_request(Platform::Tiktok, 80.0, false, Some("still down".to_string()));
        assert_eq!(monitor.circuit_state(Platform::Tiktok), CircuitState::Open);
        assert!(!monitor.is_available(Platform::Tiktok));
    }

    #[test]
    fn test_open_breaker_stays_closed_to_traffic_before_timeout() {
        let monitor = monitor();
        monitor.force_open_at(Platform::GoogleTrends, Utc::now());
        assert!(!monitor.is_available(Platform::GoogleTrends));
        assert_eq!(monitor.circuit_state(Platform::GoogleTrends), CircuitState::Open);
    }

    #[test]
    fn test_health_summary_scores_and_buckets() {
        let monitor = monitor();

        for _ in 0..9 {
            monitor.record_request(Platform::GoogleTrends, 120.0, true, None);
        }
        monitor.record_request(Platform::GoogleTrends, 150.0, false, Some("500".to_string()));

        let summary = monitor.health_summary(Platform::GoogleTrends).unwrap();
        assert_eq!(summary.last_hour.request_count, 10);
        assert_eq!(summary.last_hour.error_count, 1);
        assert!((summary.last_hour.success_rate - 0.9).abs() < 1e-9);
        assert!(summary.last_hour.mean_latency_ms > 0.0);
        assert!(summary.last_hour.p95_latency_ms >= summary.last_hour.mean_latency_ms);
        // 0.9*0.4 + 1.0*0.3 + 0.9*0.3 = 0.93
        assert!((summary.health_score - 0.93).abs() < 1e-9);
        assert_eq!(summary.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_latency_drags_health_score() {
        let monitor = monitor();

        for _ in 0..10 {
            monitor.record_request(Platform::Twitter, 2_500.0, true, None);
        }

        let summary = monitor.health_summary(Platform::Twitter).unwrap();
        // Perfect success rate, terrible latency: 0.4 + 0.0 + 0.3
        assert!((summary.health_score - 0.7).abs() < 1e-9);
        assert_eq!(summary.status, HealthStatus::Degraded);
    }
}
