use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AppError;

/// External platform a trend signal was observed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    #[serde(rename = "google_trends")]
    GoogleTrends,

    #[serde(rename = "youtube")]
    Youtube,

    #[serde(rename = "twitter")]
    Twitter,

    #[serde(rename = "tiktok")]
    Tiktok,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[
            Platform::GoogleTrends,
            Platform::Youtube,
            Platform::Twitter,
            Platform::Tiktok,
        ]
    }

    /// How often the coordinator polls this platform by default.
    /// Faster-moving platforms are polled more aggressively.
    pub fn default_poll_interval(&self) -> Duration {
        match self {
            Platform::GoogleTrends => Duration::from_secs(300),
            Platform::Youtube => Duration::from_secs(180),
            Platform::Twitter => Duration::from_secs(60),
            Platform::Tiktok => Duration::from_secs(120),
        }
    }

    /// Signal quality weighting used by the analyzer's investment score.
    /// Search data is the most deliberate intent signal; short-video
    /// virality is the noisiest.
    pub fn quality_multiplier(&self) -> f64 {
        match self {
            Platform::GoogleTrends => 1.0,
            Platform::Youtube => 0.95,
            Platform::Twitter => 0.9,
            Platform::Tiktok => 0.85,
        }
    }

    /// Baseline riskiness of acting on this platform's signals, [0,1].
    pub fn risk_factor(&self) -> f64 {
        match self {
            Platform::GoogleTrends => 0.2,
            Platform::Youtube => 0.3,
            Platform::Twitter => 0.45,
            Platform::Tiktok => 0.6,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::GoogleTrends => write!(f, "google_trends"),
            Platform::Youtube => write!(f, "youtube"),
            Platform::Twitter => write!(f, "twitter"),
            Platform::Tiktok => write!(f, "tiktok"),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "google_trends" => Ok(Platform::GoogleTrends),
            "youtube" => Ok(Platform::Youtube),
            "twitter" => Ok(Platform::Twitter),
            "tiktok" => Ok(Platform::Tiktok),
            _ => Err(format!("Unknown platform: {}", value)),
        }
    }
}

/// Maturity classification of a trend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    /// First observed within the last day
    #[serde(rename = "emerging")]
    Emerging,

    /// Under a week old with positive momentum
    #[serde(rename = "growing")]
    Growing,

    /// Under a month old, momentum flattening at a high level
    #[serde(rename = "peak")]
    Peak,

    /// Momentum trending down
    #[serde(rename = "declining")]
    Declining,

    /// Old and quiet
    #[serde(rename = "dormant")]
    Dormant,
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleStage::Emerging => write!(f, "emerging"),
            LifecycleStage::Growing => write!(f, "growing"),
            LifecycleStage::Peak => write!(f, "peak"),
            LifecycleStage::Declining => write!(f, "declining"),
            LifecycleStage::Dormant => write!(f, "dormant"),
        }
    }
}

/// One observation of a keyword on one platform.
///
/// Immutable once constructed; a fresh observation is appended to the
/// keyword's history rather than mutating a prior one. Momentum and
/// confidence are clamped to [0,1] at construction, and construction
/// fails outright for an empty keyword or non-finite scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSignal {
    pub platform: Platform,
    pub keyword: String,

    /// Normalized strength/velocity of the trend right now, [0,1]
    pub momentum: f64,

    /// How much we trust this observation, [0,1]
    pub confidence: f64,

    /// Raw observed volume (searches, views, mentions)
    pub volume: u64,

    pub timestamp: DateTime<Utc>,
    pub lifecycle_stage: LifecycleStage,

    /// Region codes in descending order of relevance
    pub geographic_scope: Vec<String>,

    pub related_keywords: Vec<String>,
}

impl TrendSignal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Platform,
        keyword: impl Into<String>,
        momentum: f64,
        confidence: f64,
        volume: u64,
        timestamp: DateTime<Utc>,
        lifecycle_stage: LifecycleStage,
        geographic_scope: Vec<String>,
        related_keywords: Vec<String>,
    ) -> Result<Self, AppError> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return Err(AppError::Validation("keyword must not be empty".to_string()));
        }
        if !momentum.is_finite() {
            return Err(AppError::Validation(format!(
                "momentum must be finite, got {}",
                momentum
            )));
        }
        if !confidence.is_finite() {
            return Err(AppError::Validation(format!(
                "confidence must be finite, got {}",
                confidence
            )));
        }

        Ok(Self {
            platform,
            keyword,
            momentum: momentum.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            volume,
            timestamp,
            lifecycle_stage,
            geographic_scope,
            related_keywords,
        })
    }

    /// Identity used for at-least-once dedup downstream: signals are
    /// identified by platform, keyword and observation time.
    pub fn identity(&self) -> (Platform, &str, DateTime<Utc>) {
        (self.platform, &self.keyword, self.timestamp)
    }
}
