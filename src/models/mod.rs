mod analysis;
mod correlation;
mod opportunity;
mod prediction;
mod trend;

pub use analysis::{TrendAnalysis, TrendRiskAssessment};
pub use correlation::{CorrelationType, TrendCorrelation};
pub use opportunity::{
    InvestmentOpportunity, InvestmentVehicle, RecommendedAction, RiskLevel,
};
pub use prediction::{PredictionOutcome, TrendPrediction, LOW_DATA_CONFIDENCE};
pub use trend::{LifecycleStage, Platform, TrendSignal};
