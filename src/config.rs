use std::time::Duration;

use crate::models::Platform;

/// Per-platform stream settings. One of these per enabled platform is
/// handed to the coordinator at construction; there is no global
/// platform registry.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub keywords: Vec<String>,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub error_backoff: Duration,
}

impl PlatformConfig {
    pub fn new(platform: Platform, keywords: Vec<String>) -> Self {
        Self {
            platform,
            keywords,
            poll_interval: platform.default_poll_interval(),
            fetch_timeout: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
        }
    }
}

/// Rate-window ceilings and money budgets for one external API.
#[derive(Debug, Clone)]
pub struct ApiBudgetConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    /// Estimated cost of a single request, in dollars.
    pub cost_per_request: f64,
    pub hourly_budget: f64,
    pub daily_budget: f64,
}

impl ApiBudgetConfig {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::GoogleTrends => Self {
                requests_per_minute: 10,
                requests_per_hour: 100,
                requests_per_day: 1_000,
                cost_per_request: 0.0,
                hourly_budget: 1.0,
                daily_budget: 10.0,
            },
            Platform::Youtube => Self {
                requests_per_minute: 30,
                requests_per_hour: 500,
                requests_per_day: 10_000,
                cost_per_request: 0.002,
                hourly_budget: 2.0,
                daily_budget: 25.0,
            },
            Platform::Twitter => Self {
                requests_per_minute: 15,
                requests_per_hour: 300,
                requests_per_day: 5_000,
                cost_per_request: 0.005,
                hourly_budget: 3.0,
                daily_budget: 30.0,
            },
            Platform::Tiktok => Self {
                requests_per_minute: 10,
                requests_per_hour: 200,
                requests_per_day: 2_000,
                cost_per_request: 0.003,
                hourly_budget: 1.5,
                daily_budget: 15.0,
            },
        }
    }
}

/// Circuit breaker and health metric settings shared by all APIs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker waits before allowing a probe.
    pub recovery_timeout: Duration,
    /// Metrics older than this are evicted lazily.
    pub metric_retention: chrono::Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            metric_retention: chrono::Duration::hours(24),
        }
    }
}

/// Opportunity mapping and portfolio selection knobs.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Hard ceiling on any single position, percent of capital.
    pub max_position_size_pct: f64,
    pub max_positions: usize,
    /// Per-sector exposure ceiling for portfolio selection, percent.
    pub max_sector_exposure_pct: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            max_position_size_pct: 10.0,
            max_positions: 10,
            max_sector_exposure_pct: 30.0,
        }
    }
}

/// Top-level application configuration, assembled in `main` and passed
/// into constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub platforms: Vec<PlatformConfig>,
    pub monitor: MonitorConfig,
    pub mapper: MapperConfig,
    pub bind_port: u16,
}

impl AppConfig {
    /// Build configuration from the environment, falling back to
    /// defaults. `TREND_KEYWORDS` is a comma-separated seed list shared
    /// by all platforms.
    pub fn from_env() -> Self {
        let keywords: Vec<String> = std::env::var("TREND_KEYWORDS")
            .unwrap_or_else(|_| "artificial intelligence,electric vehicles,weight loss drug".to_string())
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let bind_port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let platforms = Platform::all()
            .iter()
            .map(|&p| PlatformConfig::new(p, keywords.clone()))
            .collect();

        Self {
            platforms,
            monitor: MonitorConfig::default(),
            mapper: MapperConfig::default(),
            bind_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_config_defaults() {
        let config = PlatformConfig::new(Platform::Twitter, vec!["ai".to_string()]);
        assert_eq!(config.platform, Platform::Twitter);
        assert!(config.poll_interval > Duration::ZERO);
        assert!(config.error_backoff >= Duration::from_secs(1));
    }

    #[test]
    fn test_budget_config_covers_all_platforms() {
        for &platform in Platform::all() {
            let config = ApiBudgetConfig::for_platform(platform);
            assert!(config.requests_per_minute > 0);
            assert!(config.requests_per_hour >= config.requests_per_minute);
            assert!(config.requests_per_day >= config.requests_per_hour);
            assert!(config.daily_budget >= config.hourly_budget);
        }
    }
}
