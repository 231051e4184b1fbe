use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LifecycleStage, Platform};

/// Risk decomposition for a single analyzed trend. Every component and
/// the weighted overall figure lie in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendRiskAssessment {
    /// Standard deviation of recent momentum observations
    pub volatility_risk: f64,

    /// How strongly momentum is trending down
    pub decline_risk: f64,

    /// Risk of entering at the wrong point of the lifecycle
    pub timing_risk: f64,

    /// Baseline riskiness of the source platform
    pub platform_risk: f64,

    /// Weighted combination of the above
    pub overall_risk: f64,
}

/// Per-signal output of the trend analyzer, consumed by the prediction
/// engine and the opportunity mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub keyword: String,
    pub platform: Platform,
    pub lifecycle_stage: LifecycleStage,

    /// Latest observed momentum, [0,1]
    pub momentum: f64,

    /// Moving-average smoothed momentum series (empty until the history
    /// holds at least 5 points)
    pub momentum_trajectory: Vec<f64>,

    /// Linear-trend slope of the last 5 momentum observations, per
    /// observation
    pub momentum_trend: f64,

    /// Mean pairwise volume growth over recent observations, [-1,5]
    pub volume_growth_rate: f64,

    /// Composite attractiveness score, [0,1]
    pub investment_score: f64,

    pub risk: TrendRiskAssessment,

    /// Number of observations backing this analysis
    pub history_len: usize,

    pub analyzed_at: DateTime<Utc>,
}

impl TrendAnalysis {
    /// Direction of the smoothed momentum trajectory: positive when the
    /// smoothed series is still climbing.
    pub fn trajectory_direction(&self) -> f64 {
        match self.momentum_trajectory.len() {
            0 | 1 => 0.0,
            n => self.momentum_trajectory[n - 1] - self.momentum_trajectory[n - 2],
        }
    }
}
