use serde::{Deserialize, Serialize};

/// Temporal relationship between two keyword histories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CorrelationType {
    /// `keyword_a` moves before `keyword_b`
    #[serde(rename = "leading")]
    Leading,

    /// `keyword_a` moves after `keyword_b`
    #[serde(rename = "lagging")]
    Lagging,

    /// Both move together
    #[serde(rename = "concurrent")]
    Concurrent,
}

impl std::fmt::Display for CorrelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationType::Leading => write!(f, "leading"),
            CorrelationType::Lagging => write!(f, "lagging"),
            CorrelationType::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Directional statistical relationship between two keyword histories.
/// Produced by the correlation collaborator; consumed read-only by the
/// prediction engine and the opportunity mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendCorrelation {
    pub keyword_a: String,
    pub keyword_b: String,

    /// Pearson coefficient, [-1,1]
    pub coefficient: f64,

    /// Time offset between the two series; positive means `keyword_a`
    /// leads by this many hours
    pub lag_hours: i64,

    pub correlation_type: CorrelationType,

    /// Whether the coefficient cleared the collaborator's significance
    /// test
    pub significant: bool,
}

impl TrendCorrelation {
    /// A correlation the peak-timing predictor may act on: significant,
    /// leading, and reasonably strong.
    pub fn is_actionable_lead(&self) -> bool {
        self.significant
            && self.correlation_type == CorrelationType::Leading
            && self.coefficient.abs() >= 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actionable_lead() {
        let correlation = TrendCorrelation {
            keyword_a: "gpu shortage".to_string(),
            keyword_b: "artificial intelligence".to_string(),
            coefficient: 0.72,
            lag_hours: 48,
            correlation_type: CorrelationType::Leading,
            significant: true,
        };
        assert!(correlation.is_actionable_lead());

        let weak = TrendCorrelation {
            coefficient: 0.2,
            ..correlation.clone()
        };
        assert!(!weak.is_actionable_lead());

        let concurrent = TrendCorrelation {
            correlation_type: CorrelationType::Concurrent,
            ..correlation
        };
        assert!(!concurrent.is_actionable_lead());
    }
}
