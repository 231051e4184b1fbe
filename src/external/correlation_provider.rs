use crate::models::TrendCorrelation;

/// Boundary to the correlation-analysis collaborator. Supplies
/// correlation lists keyed by keyword; consumed read-only by the
/// prediction engine and the opportunity mapper.
pub trait CorrelationProvider: Send + Sync {
    fn correlations_for(&self, keyword: &str) -> Vec<TrendCorrelation>;
}

/// Fixed correlation set handed in at startup. Useful until the real
/// collaborator is wired up, and for tests.
pub struct StaticCorrelationProvider {
    correlations: Vec<TrendCorrelation>,
}

impl StaticCorrelationProvider {
    pub fn new(correlations: Vec<TrendCorrelation>) -> Self {
        Self { correlations }
    }

    pub fn empty() -> Self {
        Self {
            correlations: Vec::new(),
        }
    }
}

impl CorrelationProvider for StaticCorrelationProvider {
    fn correlations_for(&self, keyword: &str) -> Vec<TrendCorrelation> {
        self.correlations
            .iter()
            .filter(|c| c.keyword_a == keyword || c.keyword_b == keyword)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorrelationType;

    #[test]
    fn test_static_provider_filters_by_keyword() {
        let provider = StaticCorrelationProvider::new(vec![TrendCorrelation {
            keyword_a: "gpu shortage".to_string(),
            keyword_b: "artificial intelligence".to_string(),
            coefficient: 0.7,
            lag_hours: 36,
            correlation_type: CorrelationType::Leading,
            significant: true,
        }]);

        assert_eq!(provider.correlations_for("artificial intelligence").len(), 1);
        assert_eq!(provider.correlations_for("gpu shortage").len(), 1);
        assert!(provider.correlations_for("sourdough").is_empty());
    }
}
