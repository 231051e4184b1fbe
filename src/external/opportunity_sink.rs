use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::models::InvestmentOpportunity;

/// Boundary to the notification/alerting collaborator, which decides
/// delivery channel and priority. This crate only hands opportunities
/// over.
#[async_trait]
pub trait OpportunitySink: Send + Sync {
    async fn deliver(&self, opportunity: &InvestmentOpportunity);
}

/// Keeps the newest opportunity per keyword. A fresh opportunity for a
/// keyword supersedes the previous one; nothing is mutated in place.
#[derive(Default)]
pub struct OpportunityStore {
    latest: DashMap<String, InvestmentOpportunity>,
}

impl OpportunityStore {
    pub fn new() -> Self {
        Self {
            latest: DashMap::new(),
        }
    }

    pub fn record(&self, opportunity: InvestmentOpportunity) {
        self.latest
            .insert(opportunity.trend_signal.keyword.clone(), opportunity);
    }

    pub fn all(&self) -> Vec<InvestmentOpportunity> {
        let mut opportunities: Vec<InvestmentOpportunity> =
            self.latest.iter().map(|e| e.value().clone()).collect();
        opportunities.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        opportunities
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Default sink: log the recommendation and retain it in the shared
/// store for the status API and the portfolio refresh job.
pub struct LoggingOpportunitySink {
    store: std::sync::Arc<OpportunityStore>,
}

impl LoggingOpportunitySink {
    pub fn new(store: std::sync::Arc<OpportunityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OpportunitySink for LoggingOpportunitySink {
    async fn deliver(&self, opportunity: &InvestmentOpportunity) {
        info!(
            "💡 [OPPORTUNITY] {} {} {} ({:.0}% confidence, {:.1}% position, {} risk): {}",
            opportunity.recommended_action,
            opportunity.symbols.join("/"),
            opportunity.investment_vehicle,
            opportunity.confidence_score * 100.0,
            opportunity.position_size_pct,
            opportunity.risk_level,
            opportunity.reasoning
        );
        self.store.record(opportunity.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InvestmentVehicle, LifecycleStage, Platform, RecommendedAction, RiskLevel, TrendSignal,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn opportunity(keyword: &str, confidence: f64) -> InvestmentOpportunity {
        let signal = TrendSignal::new(
            Platform::GoogleTrends,
            keyword,
            0.8,
            0.9,
            1_000,
            Utc::now(),
            LifecycleStage::Growing,
            vec![],
            vec![],
        )
        .unwrap();
        InvestmentOpportunity {
            id: Uuid::new_v4(),
            trend_signal: signal,
            correlations: vec![],
            sector: "technology".to_string(),
            investment_vehicle: InvestmentVehicle::Stocks,
            recommended_action: RecommendedAction::Buy,
            confidence_score: confidence,
            risk_level: RiskLevel::Moderate,
            expected_return_pct: 20.0,
            time_horizon_days: 60,
            stop_loss_pct: 12.0,
            position_size_pct: 5.0,
            symbols: vec!["NVDA".to_string()],
            reasoning: "test".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_newer_opportunity_supersedes() {
        let store = OpportunityStore::new();
        store.record(opportunity("ai", 0.6));
        store.record(opportunity("ai", 0.9));

        assert_eq!(store.len(), 1);
        assert!((store.all()[0].confidence_score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_sorted_by_confidence() {
        let store = OpportunityStore::new();
        store.record(opportunity("ai", 0.6));
        store.record(opportunity("solar", 0.9));
        store.record(opportunity("crypto", 0.3));

        let all = store.all();
        assert_eq!(all.len(), 3);
        assert!(all[0].confidence_score >= all[1].confidence_score);
        assert!(all[1].confidence_score >= all[2].confidence_score);
    }
}
