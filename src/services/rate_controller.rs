use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::config::ApiBudgetConfig;
use crate::models::Platform;

/// How urgent a pending request is. Sorts most-urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RequestPriority {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "low")]
    Low,
}

/// Occupancy above which low-priority requests are shed from the minute
/// window, keeping headroom for everything else.
const LOW_PRIORITY_SHED_RATIO: f64 = 0.8;

#[derive(Debug, Clone)]
struct RequestRecord {
    timestamp: DateTime<Utc>,
    cost: f64,
    success: bool,
}

struct ApiState {
    config: ApiBudgetConfig,
    records: Mutex<VecDeque<RequestRecord>>,
}

/// Read-only projection of an API's remaining rate and budget headroom.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub api: Platform,
    pub minute_remaining: u32,
    pub hour_remaining: u32,
    pub day_remaining: u32,
    pub hourly_budget_remaining: f64,
    pub daily_budget_remaining: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiCostSummary {
    pub api: Platform,
    pub hourly_spend: f64,
    pub daily_spend: f64,
    pub hourly_budget: f64,
    pub daily_budget: f64,
    pub requests_today: usize,
    pub failures_today: usize,
}

/// Spend across all protected APIs over the lookback window.
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub apis: Vec<ApiCostSummary>,
    pub total_hourly_spend: f64,
    pub total_daily_spend: f64,
}

/// A request waiting for a slot in `optimize_schedule`.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub api: Platform,
    pub priority: RequestPriority,
    pub estimated_cost: f64,
}

/// `optimize_schedule` verdict for one pending request.
#[derive(Debug, Clone)]
pub struct ScheduledRequest {
    pub request: PendingRequest,
    pub admitted: bool,
    /// When a rejected request is worth retrying
    pub retry_at: Option<DateTime<Utc>>,
}

/// Admission control for external APIs: three sliding request-rate
/// windows (minute/hour/day) plus hourly and daily money budgets, per
/// API. Checks are non-blocking computations over in-memory windows;
/// denial is a "retry later", never an error, and no request is ever
/// force-admitted over a ceiling.
pub struct RateBudgetController {
    apis: DashMap<Platform, ApiState>,
}

impl RateBudgetController {
    pub fn new(configs: HashMap<Platform, ApiBudgetConfig>) -> Self {
        let apis = DashMap::new();
        for (platform, config) in configs {
            apis.insert(
                platform,
                ApiState {
                    config,
                    records: Mutex::new(VecDeque::new()),
                },
            );
        }
        Self { apis }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            Platform::all()
                .iter()
                .map(|&p| (p, ApiBudgetConfig::for_platform(p)))
                .collect(),
        )
    }

    /// Whether a request to `api` may go out right now. Evaluates rate
    /// windows first, then the projected post-request cost against both
    /// budgets; any failing check denies.
    pub fn can_make_request(&self, api: Platform, priority: RequestPriority) -> bool {
        self.can_make_request_at(api, priority, Utc::now(), 0, 0.0)
    }

    fn can_make_request_at(
        &self,
        api: Platform,
        priority: RequestPriority,
        now: DateTime<Utc>,
        extra_requests: u32,
        extra_cost: f64,
    ) -> bool {
        let state = match self.apis.get(&api) {
            Some(s) => s,
            None => return false,
        };
        let records = state.records.lock();

        let minute_count = count_since(&records, now - chrono::Duration::minutes(1)) + extra_requests;
        let minute_ceiling = if priority == RequestPriority::Low {
            (state.config.requests_per_minute as f64 * LOW_PRIORITY_SHED_RATIO).floor() as u32
        } else {
            state.config.requests_per_minute
        };
        if minute_count >= minute_ceiling {
            debug!("⏳ {} minute window full ({}/{})", api, minute_count, minute_ceiling);
            return false;
        }

        let hour_count = count_since(&records, now - chrono::Duration::hours(1)) + extra_requests;
        if hour_count >= state.config.requests_per_hour {
            debug!("⏳ {} hour window full ({}/{})", api, hour_count, state.config.requests_per_hour);
            return false;
        }

        let day_count = count_since(&records, now - chrono::Duration::hours(24)) + extra_requests;
        if day_count >= state.config.requests_per_day {
            debug!("⏳ {} day window full ({}/{})", api, day_count, state.config.requests_per_day);
            return false;
        }

        // Projected cost after this request, against both budgets.
        let request_cost = state.config.cost_per_request + extra_cost;
        let hourly_spend = cost_since(&records, now - chrono::Duration::hours(1));
        if hourly_spend + request_cost > state.config.hourly_budget {
            debug!(
                "💸 {} hourly budget reached (${:.3} + ${:.3} > ${:.3})",
                api, hourly_spend, request_cost, state.config.hourly_budget
            );
            return false;
        }

        let daily_spend = cost_since(&records, now - chrono::Duration::hours(24));
        if daily_spend + request_cost > state.config.daily_budget {
            debug!(
                "💸 {} daily budget reached (${:.3} + ${:.3} > ${:.3})",
                api, daily_spend, request_cost, state.config.daily_budget
            );
            return false;
        }

        true
    }

    /// Append a timestamped, cost-tagged entry for a request that went
    /// out, and evict entries older than the day-long lookback.
    pub fn record_request(&self, api: Platform, success: bool) {
        self.record_request_at(api, success, Utc::now());
    }

    fn record_request_at(&self, api: Platform, success: bool, timestamp: DateTime<Utc>) {
        if let Some(state) = self.apis.get(&api) {
            let cost = state.config.cost_per_request;
            let mut records = state.records.lock();
            records.push_back(RequestRecord {
                timestamp,
                cost,
                success,
            });

            let cutoff = timestamp - chrono::Duration::hours(24);
            while records.front().map(|r| r.timestamp < cutoff).unwrap_or(false) {
                records.pop_front();
            }
        }
    }

    /// Remaining rate and budget headroom for one API.
    pub fn remaining_quota(&self, api: Platform) -> Option<QuotaSnapshot> {
        let state = self.apis.get(&api)?;
        let records = state.records.lock();
        let now = Utc::now();

        let minute_used = count_since(&records, now - chrono::Duration::minutes(1));
        let hour_used = count_since(&records, now - chrono::Duration::hours(1));
        let day_used = count_since(&records, now - chrono::Duration::hours(24));
        let hourly_spend = cost_since(&records, now - chrono::Duration::hours(1));
        let daily_spend = cost_since(&records, now - chrono::Duration::hours(24));

        Some(QuotaSnapshot {
            api,
            minute_remaining: state.config.requests_per_minute.saturating_sub(minute_used),
            hour_remaining: state.config.requests_per_hour.saturating_sub(hour_used),
            day_remaining: state.config.requests_per_day.saturating_sub(day_used),
            hourly_budget_remaining: (state.config.hourly_budget - hourly_spend).max(0.0),
            daily_budget_remaining: (state.config.daily_budget - daily_spend).max(0.0),
        })
    }

    /// Spend and request counts per API over the lookback window.
    pub fn cost_summary(&self) -> CostSummary {
        let now = Utc::now();
        let mut apis = Vec::new();
        let mut total_hourly = 0.0;
        let mut total_daily = 0.0;

        for entry in self.apis.iter() {
            let records = entry.records.lock();
            let hourly_spend = cost_since(&records, now - chrono::Duration::hours(1));
            let daily_spend = cost_since(&records, now - chrono::Duration::hours(24));
            let day_cutoff = now - chrono::Duration::hours(24);
            let requests_today = records.iter().filter(|r| r.timestamp >= day_cutoff).count();
            let failures_today = records
                .iter()
                .filter(|r| r.timestamp >= day_cutoff && !r.success)
                .count();

            total_hourly += hourly_spend;
            total_daily += daily_spend;
            apis.push(ApiCostSummary {
                api: *entry.key(),
                hourly_spend,
                daily_spend,
                hourly_budget: entry.config.hourly_budget,
                daily_budget: entry.config.daily_budget,
                requests_today,
                failures_today,
            });
        }

        apis.sort_by_key(|s| s.api.to_string());
        CostSummary {
            apis,
            total_hourly_spend: total_hourly,
            total_daily_spend: total_daily,
        }
    }

    /// Minimum wait until the oldest minute-window entry expires, when
    /// the per-minute ceiling is currently exceeded. Zero otherwise.
    pub fn calculate_backoff(&self, api: Platform) -> Duration {
        let state = match self.apis.get(&api) {
            Some(s) => s,
            None => return Duration::ZERO,
        };
        let records = state.records.lock();
        let now = Utc::now();
        let window_start = now - chrono::Duration::minutes(1);

        let in_window: Vec<&RequestRecord> = records
            .iter()
            .filter(|r| r.timestamp >= window_start)
            .collect();

        if (in_window.len() as u32) < state.config.requests_per_minute {
            return Duration::ZERO;
        }

        match in_window.first() {
            Some(oldest) => {
                let expires_at = oldest.timestamp + chrono::Duration::minutes(1);
                (expires_at - now).to_std().unwrap_or(Duration::ZERO)
            }
            None => Duration::ZERO,
        }
    }

    /// Stable-sort a batch of pending requests by (priority, cost) and
    /// greedily admit while ceilings allow. Rejected requests are
    /// annotated with a projected retry time.
    pub fn optimize_schedule(&self, requests: Vec<PendingRequest>) -> Vec<ScheduledRequest> {
        let now = Utc::now();
        let mut sorted = requests;
        sorted.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.estimated_cost.partial_cmp(&b.estimated_cost).unwrap_or(std::cmp::Ordering::Equal))
        });

        // Simulated admissions so one batch cannot overrun a ceiling.
        let mut admitted_counts: HashMap<Platform, u32> = HashMap::new();
        let mut admitted_costs: HashMap<Platform, f64> = HashMap::new();

        sorted
            .into_iter()
            .map(|request| {
                let extra_requests = admitted_counts.get(&request.api).copied().unwrap_or(0);
                let extra_cost = admitted_costs.get(&request.api).copied().unwrap_or(0.0);

                if self.can_make_request_at(request.api, request.priority, now, extra_requests, extra_cost) {
                    *admitted_counts.entry(request.api).or_insert(0) += 1;
                    *admitted_costs.entry(request.api).or_insert(0.0) += request.estimated_cost;
                    ScheduledRequest {
                        request,
                        admitted: true,
                        retry_at: None,
                    }
                } else {
                    let backoff = self.calculate_backoff(request.api);
                    let wait = if backoff > Duration::ZERO {
                        backoff
                    } else {
                        // Budget-bound or batch-saturated; try again when
                        // the hour window has moved meaningfully.
                        Duration::from_secs(300)
                    };
                    ScheduledRequest {
                        request,
                        admitted: false,
                        retry_at: Some(now + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::minutes(5))),
                    }
                }
            })
            .collect()
    }

    /// Drop all entries past the day-long lookback. Called by the
    /// maintenance job; `record_request` also evicts incrementally.
    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let mut evicted = 0;
        for entry in self.apis.iter() {
            let mut records = entry.records.lock();
            while records.front().map(|r| r.timestamp < cutoff).unwrap_or(false) {
                records.pop_front();
                evicted += 1;
            }
        }
        evicted
    }
}

fn count_since(records: &VecDeque<RequestRecord>, cutoff: DateTime<Utc>) -> u32 {
    records.iter().filter(|r| r.timestamp >= cutoff).count() as u32
}

fn cost_since(records: &VecDeque<RequestRecord>, cutoff: DateTime<Utc>) -> f64 {
    records
        .iter()
        .filter(|r| r.timestamp >= cutoff)
        .map(|r| r.cost)
        .sum()
}
