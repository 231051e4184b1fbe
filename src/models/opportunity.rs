use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{TrendCorrelation, TrendSignal};

/// Instrument class an opportunity is expressed through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvestmentVehicle {
    #[serde(rename = "stocks")]
    Stocks,
    #[serde(rename = "etf")]
    Etf,
    #[serde(rename = "crypto")]
    Crypto,
    #[serde(rename = "options")]
    Options,
    #[serde(rename = "futures")]
    Futures,
    #[serde(rename = "commodities")]
    Commodities,
    #[serde(rename = "forex")]
    Forex,
}

impl InvestmentVehicle {
    /// Relative riskiness of the vehicle itself, multiplied into the
    /// blended risk figure and the stop-loss width.
    pub fn risk_multiplier(&self) -> f64 {
        match self {
            InvestmentVehicle::Etf => 0.8,
            InvestmentVehicle::Stocks => 1.0,
            InvestmentVehicle::Commodities => 1.2,
            InvestmentVehicle::Forex => 1.3,
            InvestmentVehicle::Futures => 1.5,
            InvestmentVehicle::Crypto => 1.8,
            InvestmentVehicle::Options => 2.0,
        }
    }
}

impl std::fmt::Display for InvestmentVehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvestmentVehicle::Stocks => write!(f, "stocks"),
            InvestmentVehicle::Etf => write!(f, "etf"),
            InvestmentVehicle::Crypto => write!(f, "crypto"),
            InvestmentVehicle::Options => write!(f, "options"),
            InvestmentVehicle::Futures => write!(f, "futures"),
            InvestmentVehicle::Commodities => write!(f, "commodities"),
            InvestmentVehicle::Forex => write!(f, "forex"),
        }
    }
}

/// What to do about an opportunity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecommendedAction {
    #[serde(rename = "avoid")]
    Avoid,
    #[serde(rename = "watch")]
    Watch,
    #[serde(rename = "hold")]
    Hold,
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "sell")]
    Sell,
    #[serde(rename = "strong_buy")]
    StrongBuy,
    #[serde(rename = "strong_sell")]
    StrongSell,
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendedAction::Avoid => write!(f, "avoid"),
            RecommendedAction::Watch => write!(f, "watch"),
            RecommendedAction::Hold => write!(f, "hold"),
            RecommendedAction::Buy => write!(f, "buy"),
            RecommendedAction::Sell => write!(f, "sell"),
            RecommendedAction::StrongBuy => write!(f, "strong_buy"),
            RecommendedAction::StrongSell => write!(f, "strong_sell"),
        }
    }
}

/// Bucketed risk classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "very_high")]
    VeryHigh,
}

impl RiskLevel {
    /// Bucket a blended [0,~2] risk figure.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.55 {
            RiskLevel::Moderate
        } else if score < 0.8 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    /// Base stop-loss width for the bucket, percent.
    pub fn base_stop_loss_pct(&self) -> f64 {
        match self {
            RiskLevel::Low => 8.0,
            RiskLevel::Moderate => 12.0,
            RiskLevel::High => 20.0,
            RiskLevel::VeryHigh => 30.0,
        }
    }

    /// Position sizing discount: riskier opportunities get smaller
    /// allocations.
    pub fn position_adjustment(&self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Moderate => 0.8,
            RiskLevel::High => 0.6,
            RiskLevel::VeryHigh => 0.4,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// A scored, risk-sized, time-boxed recommendation derived from one
/// analyzed trend. Created once per mapping pass and never mutated; a
/// newer opportunity for the same keyword supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentOpportunity {
    pub id: Uuid,
    pub trend_signal: TrendSignal,

    /// Strongest correlations backing the thesis, at most 3
    pub correlations: Vec<TrendCorrelation>,

    /// Sector the keyword mapped to; portfolio selection enforces a
    /// per-sector exposure ceiling over this field
    pub sector: String,

    pub investment_vehicle: InvestmentVehicle,
    pub recommended_action: RecommendedAction,

    /// Overall conviction, [0,1]
    pub confidence_score: f64,

    pub risk_level: RiskLevel,

    /// Expected return over the horizon, percent, [-50,100]
    pub expected_return_pct: f64,

    /// 1–365 days
    pub time_horizon_days: u32,

    /// Stop-loss distance, percent, [5,50]
    pub stop_loss_pct: f64,

    /// Share of capital to allocate, percent, never above the configured
    /// maximum
    pub position_size_pct: f64,

    /// 1–3 tickers
    pub symbols: Vec<String>,

    pub reasoning: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.95), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::from_score(1.5), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_vehicle_risk_ordering() {
        assert!(InvestmentVehicle::Etf.risk_multiplier() < InvestmentVehicle::Stocks.risk_multiplier());
        assert!(InvestmentVehicle::Crypto.risk_multiplier() > InvestmentVehicle::Stocks.risk_multiplier());
        assert!(InvestmentVehicle::Options.risk_multiplier() >= InvestmentVehicle::Crypto.risk_multiplier());
    }

    #[test]
    fn test_position_adjustment_monotonic() {
        assert!(RiskLevel::Low.position_adjustment() > RiskLevel::Moderate.position_adjustment());
        assert!(RiskLevel::Moderate.position_adjustment() > RiskLevel::High.position_adjustment());
        assert!(RiskLevel::High.position_adjustment() > RiskLevel::VeryHigh.position_adjustment());
    }
}
