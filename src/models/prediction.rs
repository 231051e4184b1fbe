use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LifecycleStage;

/// Confidence assigned to any prediction made from fewer than 3 history
/// points.
pub const LOW_DATA_CONFIDENCE: f64 = 0.3;

/// Per-type prediction payload. A tagged enum keeps downstream match
/// arms exhaustive when a new prediction type is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// Extrapolated momentum at the end of the horizon, [0,1]
    Momentum { predicted_momentum: f64 },

    /// Projected volume and the smoothed growth rate that produced it
    VolumeGrowth {
        predicted_volume: u64,
        growth_rate: f64,
    },

    /// Most likely next lifecycle stage and when the transition is
    /// expected
    LifecycleTransition {
        next_stage: LifecycleStage,
        estimated_hours: f64,
    },

    /// Hours until the trend peaks; zero means the peak is imminent or
    /// already passed
    PeakTiming { hours_to_peak: f64 },
}

impl PredictionOutcome {
    pub fn type_name(&self) -> &'static str {
        match self {
            PredictionOutcome::Momentum { .. } => "momentum",
            PredictionOutcome::VolumeGrowth { .. } => "volume_growth",
            PredictionOutcome::LifecycleTransition { .. } => "lifecycle_transition",
            PredictionOutcome::PeakTiming { .. } => "peak_timing",
        }
    }
}

/// Uniform result returned by every forecasting function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPrediction {
    pub keyword: String,
    pub outcome: PredictionOutcome,

    /// How much to trust the prediction, [0,1]
    pub confidence: f64,

    /// Horizon the prediction covers
    pub horizon_hours: f64,

    /// Human-readable factors that drove the prediction
    pub supporting_factors: Vec<String>,

    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_type_names() {
        let outcome = PredictionOutcome::Momentum {
            predicted_momentum: 0.7,
        };
        assert_eq!(outcome.type_name(), "momentum");

        let outcome = PredictionOutcome::LifecycleTransition {
            next_stage: LifecycleStage::Peak,
            estimated_hours: 48.0,
        };
        assert_eq!(outcome.type_name(), "lifecycle_transition");
    }
}
