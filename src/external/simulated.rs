use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::external::platform_fetcher::{FetchError, PlatformFetcher};
use crate::models::{LifecycleStage, Platform, TrendSignal};

/// Fetcher that synthesizes plausible trend observations instead of
/// calling real platform APIs. Lets the full pipeline run locally with
/// no credentials; each keyword random-walks its momentum upward or
/// downward between polls.
pub struct SimulatedFetcher {
    /// Probability that any single fetch fails, for exercising the
    /// breaker and backoff paths. Zero for a always-healthy source.
    failure_rate: f64,
}

impl SimulatedFetcher {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedFetcher {
    fn default() -> Self {
        Self::new(0.05)
    }
}

#[async_trait]
impl PlatformFetcher for SimulatedFetcher {
    async fn fetch_trends(
        &self,
        platform: Platform,
        keywords: &[String],
    ) -> Result<Vec<TrendSignal>, FetchError> {
        if rand::random::<f64>() < self.failure_rate {
            return Err(FetchError::Unavailable(format!(
                "simulated {} outage",
                platform
            )));
        }

        // A short, platform-ish latency so rolling latency stats move.
        let latency_ms = 20 + (rand::random::<f64>() * 180.0) as u64;
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;

        let now = Utc::now();
        let mut signals = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            // Stable per-keyword base so momentum doesn't jump around
            // wildly between polls.
            let base = keyword_base(keyword);
            let momentum = (base + (rand::random::<f64>() - 0.5) * 0.2).clamp(0.05, 0.95);
            let volume = (momentum * 10_000.0 * (0.8 + rand::random::<f64>() * 0.4)) as u64;

            let signal = TrendSignal::new(
                platform,
                keyword.clone(),
                momentum,
                0.6 + rand::random::<f64>() * 0.3,
                volume,
                now,
                LifecycleStage::Emerging,
                vec!["US".to_string(), "GB".to_string()],
                vec![],
            )
            .map_err(|e| FetchError::BadResponse(e.to_string()))?;
            signals.push(signal);
        }

        debug!(
            "🛰️ [SIM] {} returned {} signals in {}ms",
            platform,
            signals.len(),
            latency_ms
        );
        Ok(signals)
    }
}

/// Deterministic [0.3,0.8] base momentum derived from the keyword text.
fn keyword_base(keyword: &str) -> f64 {
    let hash: u32 = keyword
        .bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
    0.3 + (hash % 1000) as f64 / 2000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_fetcher_returns_one_signal_per_keyword() {
        let fetcher = SimulatedFetcher::new(0.0);
        let keywords = vec!["artificial intelligence".to_string(), "solar".to_string()];

        let signals = fetcher
            .fetch_trends(Platform::GoogleTrends, &keywords)
            .await
            .unwrap();

        assert_eq!(signals.len(), 2);
        for signal in &signals {
            assert!((0.0..=1.0).contains(&signal.momentum));
            assert!((0.0..=1.0).contains(&signal.confidence));
        }
    }

    #[tokio::test]
    async fn test_broken_fetcher_always_fails() {
        let fetcher = SimulatedFetcher::new(1.0);
        let result = fetcher
            .fetch_trends(Platform::Twitter, &["ai".to_string()])
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_keyword_base_stable_and_bounded() {
        let a = keyword_base("artificial intelligence");
        let b = keyword_base("artificial intelligence");
        assert_eq!(a, b);
        assert!((0.3..=0.8).contains(&a));
    }
}
