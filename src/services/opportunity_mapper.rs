use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MapperConfig;
use crate::models::{
    InvestmentOpportunity, InvestmentVehicle, LifecycleStage, RecommendedAction, RiskLevel,
    TrendAnalysis, TrendCorrelation,
};

/// A tradable candidate within a sector mapping. Volatility and beta
/// are coarse, slow-moving descriptors of the instrument, not live
/// market data.
#[derive(Debug, Clone)]
pub struct SymbolCandidate {
    pub symbol: String,
    /// Annualized volatility estimate, [0,1]-ish scale
    pub volatility: f64,
    /// Market beta estimate
    pub beta: f64,
}

impl SymbolCandidate {
    fn new(symbol: &str, volatility: f64, beta: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            volatility,
            beta,
        }
    }
}

/// One row of the keyword-to-sector table: a compiled pattern, the
/// sector it maps to, how the sector is traded, and the candidates to
/// size against the trend.
#[derive(Debug, Clone)]
pub struct SectorMapping {
    pub pattern: Regex,
    pub sector: String,
    pub vehicle: InvestmentVehicle,
    pub candidates: Vec<SymbolCandidate>,
    /// Sector-specific haircut or boost on trend confidence
    pub confidence_multiplier: f64,
}

/// Maps analyzed trends to ranked, risk-sized investment opportunities
/// using an ordered regex table compiled once at startup, and selects a
/// bounded, diversified portfolio from a batch of opportunities.
pub struct OpportunityMapper {
    config: MapperConfig,
    mappings: Vec<SectorMapping>,
}

impl OpportunityMapper {
    pub fn new(config: MapperConfig, mappings: Vec<SectorMapping>) -> Self {
        Self { config, mappings }
    }

    pub fn with_default_mappings(config: MapperConfig) -> Self {
        Self::new(config, default_mappings())
    }

    /// Map one analyzed trend to opportunities, one per matching sector
    /// row. Returns an empty vec when no pattern matches or conviction
    /// is too weak to say anything at all.
    pub fn map_opportunities(
        &self,
        analysis: &TrendAnalysis,
        correlations: &[TrendCorrelation],
        trigger: &crate::models::TrendSignal,
    ) -> Vec<InvestmentOpportunity> {
        let keyword = analysis.keyword.to_lowercase();
        let mut opportunities = Vec::new();

        for mapping in &self.mappings {
            if !mapping.pattern.is_match(&keyword) {
                continue;
            }

            let confidence = (analysis.investment_score
                * trigger.confidence
                * mapping.confidence_multiplier)
                .clamp(0.0, 1.0);

            let symbols = self.select_symbols(mapping, analysis);
            if symbols.is_empty() {
                continue;
            }

            let action = classify_action(confidence, analysis.lifecycle_stage);
            let blended_risk = analysis.risk.overall_risk * 0.7
                + (mapping.vehicle.risk_multiplier() / 2.0) * 0.3;
            let risk_level = RiskLevel::from_score(blended_risk);

            let expected_return_pct = expected_return(
                analysis.investment_score,
                mapping.vehicle.risk_multiplier(),
                analysis.lifecycle_stage,
            );
            let time_horizon_days = time_horizon(analysis);
            let position_size_pct = (confidence
                * risk_level.position_adjustment()
                * self.config.max_position_size_pct)
                .clamp(0.0, self.config.max_position_size_pct);
            let stop_loss_pct =
                (risk_level.base_stop_loss_pct() * mapping.vehicle.risk_multiplier()).clamp(5.0, 50.0);

            let mut strongest: Vec<TrendCorrelation> = correlations.to_vec();
            strongest.sort_by(|a, b| {
                b.coefficient
                    .abs()
                    .partial_cmp(&a.coefficient.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            strongest.truncate(3);

            let reasoning = build_reasoning(analysis, &mapping.sector, action, &symbols);
            debug!(
                "💡 [MAPPER] {} → {} ({}, {:.0}% confidence)",
                analysis.keyword,
                mapping.sector,
                action,
                confidence * 100.0
            );

            opportunities.push(InvestmentOpportunity {
                id: Uuid::new_v4(),
                trend_signal: trigger.clone(),
                correlations: strongest,
                sector: mapping.sector.clone(),
                investment_vehicle: mapping.vehicle,
                recommended_action: action,
                confidence_score: confidence,
                risk_level,
                expected_return_pct,
                time_horizon_days,
                stop_loss_pct,
                position_size_pct,
                symbols,
                reasoning,
                generated_at: Utc::now(),
            });
        }

        opportunities
    }

    /// Score candidates by how well their volatility/beta profile fits
    /// the trend's momentum and stage, keep the top 3.
    fn select_symbols(&self, mapping: &SectorMapping, analysis: &TrendAnalysis) -> Vec<String> {
        // Early, fast-moving trends reward high-beta exposure; late or
        // fading trends want the defensive end of the sector.
        let aggression = match analysis.lifecycle_stage {
            LifecycleStage::Emerging => 0.9,
            LifecycleStage::Growing => 0.75,
            LifecycleStage::Peak => 0.4,
            LifecycleStage::Declining => 0.2,
            LifecycleStage::Dormant => 0.1,
        } * analysis.momentum;

        let mut scored: Vec<(f64, &SymbolCandidate)> = mapping
            .candidates
            .iter()
            .map(|c| {
                let target_volatility = 0.2 + 0.6 * aggression;
                let target_beta = 0.8 + 1.2 * aggression;
                let fit = 1.0
                    - ((c.volatility - target_volatility).abs()
                        + (c.beta - target_beta).abs() / 2.0)
                        / 2.0;
                (fit, c)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(3)
            .map(|(_, c)| c.symbol.clone())
            .collect()
    }

    /// Greedy diversified selection: descending confidence, total
    /// position ≤ 100%, per-sector exposure ≤ the configured ceiling.
    pub fn select_portfolio(
        &self,
        opportunities: &[InvestmentOpportunity],
        max_positions: usize,
        max_sector_exposure_pct: f64,
    ) -> Vec<InvestmentOpportunity> {
        let mut ranked: Vec<&InvestmentOpportunity> = opportunities
            .iter()
            .filter(|o| {
                matches!(
                    o.recommended_action,
                    RecommendedAction::Buy | RecommendedAction::StrongBuy | RecommendedAction::Hold
                )
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selected: Vec<InvestmentOpportunity> = Vec::new();
        let mut total_position = 0.0;
        let mut sector_exposure: std::collections::HashMap<String, f64> =
            std::collections::HashMap::new();

        for opportunity in ranked {
            if selected.len() >= max_positions {
                break;
            }
            if total_position + opportunity.position_size_pct > 100.0 {
                continue;
            }
            let sector_total = sector_exposure
                .get(&opportunity.sector)
                .copied()
                .unwrap_or(0.0);
            if sector_total + opportunity.position_size_pct > max_sector_exposure_pct {
                debug!(
                    "🚫 [PORTFOLIO] skipping {} ({}): sector ceiling",
                    opportunity.symbols.join("/"),
                    opportunity.sector
                );
                continue;
            }

            total_position += opportunity.position_size_pct;
            *sector_exposure.entry(opportunity.sector.clone()).or_insert(0.0) +=
                opportunity.position_size_pct;
            selected.push(opportunity.clone());
        }

        info!(
            "📊 [PORTFOLIO] selected {} positions, {:.1}% deployed across {} sectors",
            selected.len(),
            total_position,
            sector_exposure.len()
        );
        selected
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }
}

fn classify_action(confidence: f64, stage: LifecycleStage) -> RecommendedAction {
    let fading = matches!(stage, LifecycleStage::Declining | LifecycleStage::Dormant);

    if confidence < 0.3 {
        RecommendedAction::Avoid
    } else if confidence < 0.5 {
        RecommendedAction::Watch
    } else if confidence < 0.7 {
        match stage {
            LifecycleStage::Emerging | LifecycleStage::Growing => RecommendedAction::Buy,
            _ => RecommendedAction::Hold,
        }
    } else if fading {
        if confidence >= 0.85 {
            RecommendedAction::StrongSell
        } else {
            RecommendedAction::Sell
        }
    } else if confidence >= 0.85 {
        RecommendedAction::StrongBuy
    } else {
        RecommendedAction::Buy
    }
}

fn expected_return(investment_score: f64, vehicle_multiplier: f64, stage: LifecycleStage) -> f64 {
    let stage_multiplier = match stage {
        LifecycleStage::Emerging => 1.3,
        LifecycleStage::Growing => 1.1,
        LifecycleStage::Peak => 0.6,
        LifecycleStage::Declining => -0.5,
        LifecycleStage::Dormant => -0.8,
    };
    (investment_score * 40.0 * vehicle_multiplier * stage_multiplier).clamp(-50.0, 100.0)
}

fn time_horizon(analysis: &TrendAnalysis) -> u32 {
    let base: i64 = match analysis.lifecycle_stage {
        LifecycleStage::Emerging => 90,
        LifecycleStage::Growing => 60,
        LifecycleStage::Peak => 21,
        LifecycleStage::Declining => 7,
        LifecycleStage::Dormant => 3,
    };
    // A still-climbing trajectory buys more runway; a rolling-over one
    // shortens the clock.
    let adjusted = if analysis.trajectory_direction() > 0.0 {
        (base as f64 * 1.25) as i64
    } else if analysis.trajectory_direction() < 0.0 {
        (base as f64 * 0.75) as i64
    } else {
        base
    };
    adjusted.clamp(1, 365) as u32
}

fn build_reasoning(
    analysis: &TrendAnalysis,
    sector: &str,
    action: RecommendedAction,
    symbols: &[String],
) -> String {
    format!(
        "'{}' is {} on {} with momentum {:.2} and a {:+.1}% volume growth rate; \
         mapped to the {} sector ({}), recommending {} with overall risk {:.2}.",
        analysis.keyword,
        analysis.lifecycle_stage,
        analysis.platform,
        analysis.momentum,
        analysis.volume_growth_rate * 100.0,
        sector,
        symbols.join(", "),
        action,
        analysis.risk.overall_risk,
    )
}

/// Built-in keyword-to-sector table. Patterns are matched against the
/// lowercased keyword; ordering matters when patterns overlap.
pub fn default_mappings() -> Vec<SectorMapping> {
    let row = |pattern: &str,
               sector: &str,
               vehicle: InvestmentVehicle,
               multiplier: f64,
               candidates: Vec<SymbolCandidate>| {
        SectorMapping {
            pattern: Regex::new(pattern).expect("static mapping pattern must compile"),
            sector: sector.to_string(),
            vehicle,
            candidates,
            confidence_multiplier: multiplier,
        }
    };

    vec![
        row(
            r"\b(ai|artificial intelligence|machine learning|neural|chatbot|gpt|llm)\b",
            "technology",
            InvestmentVehicle::Stocks,
            1.1,
            vec![
                SymbolCandidate::new("NVDA", 0.45, 1.7),
                SymbolCandidate::new("MSFT", 0.25, 1.1),
                SymbolCandidate::new("GOOGL", 0.3, 1.2),
                SymbolCandidate::new("AIQ", 0.2, 1.0),
            ],
        ),
        row(
            r"\b(crypto|bitcoin|ethereum|blockchain|defi|nft)\b",
            "crypto",
            InvestmentVehicle::Crypto,
            0.85,
            vec![
                SymbolCandidate::new("BTC-USD", 0.7, 2.0),
                SymbolCandidate::new("ETH-USD", 0.8, 2.2),
                SymbolCandidate::new("COIN", 0.65, 2.4),
            ],
        ),
        row(
            r"\b(electric vehicle|ev|battery|charging|autonomous driving)\b",
            "automotive",
            InvestmentVehicle::Stocks,
            1.0,
            vec![
                SymbolCandidate::new("TSLA", 0.55, 1.9),
                SymbolCandidate::new("RIVN", 0.75, 2.1),
                SymbolCandidate::new("DRIV", 0.25, 1.1),
            ],
        ),
        row(
            r"\b(solar|wind power|renewable|clean energy|green hydrogen)\b",
            "clean_energy",
            InvestmentVehicle::Etf,
            1.0,
            vec![
                SymbolCandidate::new("ICLN", 0.3, 1.2),
                SymbolCandidate::new("TAN", 0.45, 1.5),
                SymbolCandidate::new("ENPH", 0.6, 1.8),
            ],
        ),
        row(
            r"\b(weight loss|ozempic|glp-1|vaccine|gene therapy|biotech)\b",
            "healthcare",
            InvestmentVehicle::Stocks,
            1.05,
            vec![
                SymbolCandidate::new("LLY", 0.3, 0.9),
                SymbolCandidate::new("NVO", 0.3, 0.8),
                SymbolCandidate::new("XBI", 0.4, 1.3),
            ],
        ),
        row(
            r"\b(gaming|esports|metaverse|vr|virtual reality)\b",
            "gaming",
            InvestmentVehicle::Stocks,
            0.95,
            vec![
                SymbolCandidate::new("RBLX", 0.6, 1.8),
                SymbolCandidate::new("U", 0.65, 1.9),
                SymbolCandidate::new("ESPO", 0.3, 1.2),
            ],
        ),
        row(
            r"\b(gold|silver|oil|gas prices|commodity|lithium|uranium)\b",
            "commodities",
            InvestmentVehicle::Commodities,
            0.9,
            vec![
                SymbolCandidate::new("GLD", 0.15, 0.3),
                SymbolCandidate::new("USO", 0.35, 0.8),
                SymbolCandidate::new("URA", 0.5, 1.4),
            ],
        ),
        row(
            r"\b(streaming|social media|creator economy|short video)\b",
            "media",
            InvestmentVehicle::Stocks,
            0.95,
            vec![
                SymbolCandidate::new("NFLX", 0.4, 1.3),
                SymbolCandidate::new("META", 0.4, 1.4),
                SymbolCandidate::new("SPOT", 0.45, 1.5),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, TrendRiskAssessment, TrendSignal};
    use chrono::Utc;

    fn analysis(
        keyword: &str,
        stage: LifecycleStage,
        score: f64,
        overall_risk: f64,
    ) -> TrendAnalysis {
        TrendAnalysis {
            keyword: keyword.to_string(),
            platform: Platform::GoogleTrends,
            lifecycle_stage: stage,
            momentum: 0.8,
            momentum_trajectory: vec![0.5, 0.6, 0.7],
            momentum_trend: 0.05,
            volume_growth_rate: 0.4,
            investment_score: score,
            risk: TrendRiskAssessment {
                volatility_risk: 0.3,
                decline_risk: 0.1,
                timing_risk: 0.3,
                platform_risk: 0.2,
                overall_risk,
            },
            history_len: 6,
            analyzed_at: Utc::now(),
        }
    }

    fn trigger(keyword: &str) -> TrendSignal {
        TrendSignal::new(
            Platform::GoogleTrends,
            keyword,
            0.8,
            0.9,
            5_000,
            Utc::now(),
            LifecycleStage::Growing,
            vec!["US".to_string()],
            vec![],
        )
        .unwrap()
    }

    fn mapper() -> OpportunityMapper {
        OpportunityMapper::with_default_mappings(MapperConfig::default())
    }

    #[test]
    fn test_ai_keyword_maps_to_technology() {
        let mapper = mapper();
        let analysis = analysis("artificial intelligence", LifecycleStage::Growing, 0.8, 0.3);
        let opportunities = mapper.map_opportunities(&analysis, &[], &trigger("artificial intelligence"));

        assert_eq!(opportunities.len(), 1);
        let opportunity = &opportunities[0];
        assert_eq!(opportunity.sector, "technology");
        assert!(!opportunity.symbols.is_empty());
        assert!(opportunity.symbols.len() <= 3);
        assert!(opportunity.symbols.iter().any(|s| ["NVDA", "MSFT", "GOOGL", "AIQ"].contains(&s.as_str())));
    }

    #[test]
    fn test_unmatched_keyword_yields_nothing() {
        let mapper = mapper();
        let analysis = analysis("sourdough starters", LifecycleStage::Growing, 0.8, 0.3);
        assert!(mapper
            .map_opportunities(&analysis, &[], &trigger("sourdough starters"))
            .is_empty());
    }

    #[test]
    fn test_bounds_always_hold() {
        let mapper = mapper();
        let stages = [
            LifecycleStage::Emerging,
            LifecycleStage::Growing,
            LifecycleStage::Peak,
            LifecycleStage::Declining,
            LifecycleStage::Dormant,
        ];
        for stage in stages {
            for score in [0.1, 0.5, 0.9] {
                for risk in [0.1, 0.5, 0.9] {
                    let analysis = analysis("bitcoin", stage, score, risk);
                    for opportunity in
                        mapper.map_opportunities(&analysis, &[], &trigger("bitcoin"))
                    {
                        assert!(opportunity.position_size_pct <= 10.0);
                        assert!((5.0..=50.0).contains(&opportunity.stop_loss_pct));
                        assert!((-50.0..=100.0).contains(&opportunity.expected_return_pct));
                        assert!((1..=365).contains(&opportunity.time_horizon_days));
                        assert!((0.0..=1.0).contains(&opportunity.confidence_score));
                    }
                }
            }
        }
    }

    #[test]
    fn test_action_thresholds() {
        assert_eq!(classify_action(0.2, LifecycleStage::Growing), RecommendedAction::Avoid);
        assert_eq!(classify_action(0.4, LifecycleStage::Growing), RecommendedAction::Watch);
        assert_eq!(classify_action(0.6, LifecycleStage::Growing), RecommendedAction::Buy);
        assert_eq!(classify_action(0.6, LifecycleStage::Peak), RecommendedAction::Hold);
        assert_eq!(classify_action(0.75, LifecycleStage::Growing), RecommendedAction::Buy);
        assert_eq!(classify_action(0.9, LifecycleStage::Growing), RecommendedAction::StrongBuy);
        assert_eq!(classify_action(0.75, LifecycleStage::Declining), RecommendedAction::Sell);
        assert_eq!(classify_action(0.9, LifecycleStage::Dormant), RecommendedAction::StrongSell);
    }

    #[test]
    fn test_declining_stage_prefers_defensive_symbols() {
        let mapper = mapper();
        let hot = analysis("artificial intelligence", LifecycleStage::Emerging, 0.9, 0.3);
        let cold = analysis("artificial intelligence", LifecycleStage::Declining, 0.9, 0.3);

        let hot_symbols = &mapper.map_opportunities(&hot, &[], &trigger("ai"))[0].symbols;
        let cold_symbols = &mapper.map_opportunities(&cold, &[], &trigger("ai"))[0].symbols;

        // The aggressive pick leads with the high-beta name, the
        // defensive one with the low-volatility ETF.
        assert_eq!(hot_symbols[0], "NVDA");
        assert_ne!(cold_symbols[0], "NVDA");
    }

    #[test]
    fn test_correlations_bounded_to_top_three() {
        let mapper = mapper();
        let analysis = analysis("ethereum", LifecycleStage::Growing, 0.8, 0.3);
        let correlations: Vec<TrendCorrelation> = (0..5)
            .map(|i| TrendCorrelation {
                keyword_a: format!("related-{}", i),
                keyword_b: "ethereum".to_string(),
                coefficient: 0.3 + 0.1 * i as f64,
                lag_hours: 12,
                correlation_type: crate::models::CorrelationType::Concurrent,
                significant: true,
            })
            .collect();

        let opportunities = mapper.map_opportunities(&analysis, &correlations, &trigger("ethereum"));
        assert_eq!(opportunities[0].correlations.len(), 3);
        // Strongest first.
        assert!(opportunities[0].correlations[0].coefficient >= opportunities[0].correlations[1].coefficient);
    }

    #[test]
    fn test_portfolio_respects_total_and_sector_ceilings() {
        let mapper = mapper();
        let mut opportunities = Vec::new();
        for i in 0..8 {
            let keyword = if i % 2 == 0 { "artificial intelligence" } else { "bitcoin" };
            let analysis = analysis(keyword, LifecycleStage::Growing, 0.9, 0.2);
            opportunities.extend(mapper.map_opportunities(&analysis, &[], &trigger(keyword)));
        }

        let selected = mapper.select_portfolio(&opportunities, 10, 30.0);

        let total: f64 = selected.iter().map(|o| o.position_size_pct).sum();
        assert!(total <= 100.0);

        let mut by_sector: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
        for opportunity in &selected {
            *by_sector.entry(opportunity.sector.as_str()).or_insert(0.0) +=
                opportunity.position_size_pct;
        }
        for (&sector, &exposure) in &by_sector {
            assert!(
                exposure <= 30.0,
                "sector {} exposure {:.1}% breaches ceiling",
                sector,
                exposure
            );
        }
    }

    #[test]
    fn test_portfolio_caps_position_count() {
        let mapper = mapper();
        let mut opportunities = Vec::new();
        for _ in 0..6 {
            let analysis = analysis("solar", LifecycleStage::Growing, 0.9, 0.2);
            opportunities.extend(mapper.map_opportunities(&analysis, &[], &trigger("solar")));
        }
        let selected = mapper.select_portfolio(&opportunities, 2, 100.0);
        assert!(selected.len() <= 2);
    }
}
