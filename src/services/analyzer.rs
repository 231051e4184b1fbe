use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::models::{LifecycleStage, TrendAnalysis, TrendRiskAssessment, TrendSignal};

/// Number of trailing observations the trend-direction math looks at.
const TREND_WINDOW: usize = 5;

/// Points required before the smoothed trajectory is produced.
const TRAJECTORY_MIN_POINTS: usize = 5;

/// Moving-average width for trajectory smoothing.
const SMOOTHING_WINDOW: usize = 3;

/// Maintains a per-keyword, append-only history of trend signals and
/// classifies each new observation: lifecycle stage, momentum
/// trajectory, volume growth, investment score and a risk vector.
/// The analyzer never emits opportunities itself.
pub struct TrendAnalyzer {
    histories: DashMap<String, Vec<TrendSignal>>,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self {
            histories: DashMap::new(),
        }
    }

    /// Append a signal to its keyword's history and produce the
    /// analysis for the updated history.
    pub fn observe(&self, signal: TrendSignal) -> TrendAnalysis {
        let keyword = signal.keyword.clone();
        let mut history = self.histories.entry(keyword.clone()).or_default();
        history.push(signal);
        // Histories arrive roughly ordered per platform; keep the
        // cross-platform merge ordered by observation time.
        history.sort_by_key(|s| s.timestamp);
        let analysis = analyze_history(&history);
        debug!(
            "🔬 [ANALYZER] {} → {} (score {:.2}, {} obs)",
            keyword, analysis.lifecycle_stage, analysis.investment_score, analysis.history_len
        );
        analysis
    }

    /// Re-analyze a keyword's current history without appending.
    pub fn analyze(&self, keyword: &str) -> Option<TrendAnalysis> {
        let history = self.histories.get(keyword)?;
        if history.is_empty() {
            return None;
        }
        Some(analyze_history(&history))
    }

    pub fn history(&self, keyword: &str) -> Vec<TrendSignal> {
        self.histories
            .get(keyword)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn tracked_keywords(&self) -> Vec<String> {
        self.histories.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure classification over an ordered history. Signal age is the span
/// from the first to the latest observation, so re-running over an
/// unchanged history always yields the same answer.
pub fn analyze_history(history: &[TrendSignal]) -> TrendAnalysis {
    let latest = history.last().expect("analyze_history requires a non-empty history");

    let momentums: Vec<f64> = history.iter().map(|s| s.momentum).collect();
    let volumes: Vec<f64> = history.iter().map(|s| s.volume as f64).collect();

    let momentum_trend = linear_trend(tail(&momentums, TREND_WINDOW));
    let volume_trend = linear_trend(tail(&volumes, TREND_WINDOW));

    let lifecycle_stage = classify_lifecycle(history, momentum_trend, latest.momentum);
    let momentum_trajectory = smooth_trajectory(&momentums);
    let volume_growth_rate = volume_growth(&volumes);

    let investment_score = investment_score(
        latest,
        lifecycle_stage,
        momentum_trend,
        volume_growth_rate,
    );
    let risk = assess_risk(history, lifecycle_stage, momentum_trend);

    TrendAnalysis {
        keyword: latest.keyword.clone(),
        platform: latest.platform,
        lifecycle_stage,
        momentum: latest.momentum,
        momentum_trajectory,
        momentum_trend,
        volume_growth_rate,
        investment_score,
        risk,
        history_len: history.len(),
        analyzed_at: Utc::now(),
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Slope of the least-squares line through equally spaced observations,
/// in value units per observation.
fn linear_trend(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

fn classify_lifecycle(
    history: &[TrendSignal],
    momentum_trend: f64,
    current_momentum: f64,
) -> LifecycleStage {
    let first = history.first().expect("non-empty history");
    let latest = history.last().expect("non-empty history");
    let age = latest.timestamp - first.timestamp;

    if age < chrono::Duration::hours(24) {
        LifecycleStage::Emerging
    } else if age < chrono::Duration::weeks(1) {
        if momentum_trend > 0.0 {
            LifecycleStage::Growing
        } else {
            LifecycleStage::Declining
        }
    } else if age < chrono::Duration::days(30) {
        if momentum_trend >= 0.0 {
            LifecycleStage::Peak
        } else {
            LifecycleStage::Declining
        }
    } else if current_momentum < 0.3 {
        LifecycleStage::Dormant
    } else {
        LifecycleStage::Declining
    }
}

/// Moving-window average once enough points exist; empty otherwise.
fn smooth_trajectory(momentums: &[f64]) -> Vec<f64> {
    if momentums.len() < TRAJECTORY_MIN_POINTS {
        return Vec::new();
    }
    momentums
        .windows(SMOOTHING_WINDOW)
        .map(|w| w.iter().sum::<f64>() / w.len() as f64)
        .collect()
}

/// Mean pairwise growth over the trailing observations, clamped [-1,5].
fn volume_growth(volumes: &[f64]) -> f64 {
    let recent = tail(volumes, TREND_WINDOW);
    if recent.len() < 2 {
        return 0.0;
    }
    let growths: Vec<f64> = recent
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if growths.is_empty() {
        return 0.0;
    }
    let mean = growths.iter().sum::<f64>() / growths.len() as f64;
    mean.clamp(-1.0, 5.0)
}

fn stage_multiplier(stage: LifecycleStage) -> f64 {
    match stage {
        LifecycleStage::Emerging => 1.1,
        LifecycleStage::Growing => 1.2,
        LifecycleStage::Peak => 0.9,
        LifecycleStage::Declining => 0.5,
        LifecycleStage::Dormant => 0.2,
    }
}

fn investment_score(
    latest: &TrendSignal,
    stage: LifecycleStage,
    momentum_trend: f64,
    volume_growth_rate: f64,
) -> f64 {
    let base = latest.momentum * stage_multiplier(stage);
    let volume_bonus = volume_growth_rate.clamp(0.0, 5.0) * 0.04;
    let trend_bonus = (momentum_trend * 10.0).clamp(0.0, 0.15);

    ((base + volume_bonus + trend_bonus) * latest.platform.quality_multiplier()).clamp(0.0, 1.0)
}

fn assess_risk(
    history: &[TrendSignal],
    stage: LifecycleStage,
    momentum_trend: f64,
) -> TrendRiskAssessment {
    let momentums: Vec<f64> = history.iter().map(|s| s.momentum).collect();
    let recent = tail(&momentums, TREND_WINDOW * 2);

    // Momentum on [0,1] makes its std a natural [0,~0.5] figure; double
    // it so a wildly swinging trend saturates the component.
    let volatility_risk = (std_dev(recent) * 2.0).clamp(0.0, 1.0);

    let decline_risk = (-momentum_trend * 10.0).clamp(0.0, 1.0);

    let timing_risk = match stage {
        LifecycleStage::Emerging => 0.5,
        LifecycleStage::Growing => 0.3,
        LifecycleStage::Peak => 0.7,
        LifecycleStage::Declining => 0.85,
        LifecycleStage::Dormant => 0.95,
    };

    let platform_risk = history
        .last()
        .map(|s| s.platform.risk_factor())
        .unwrap_or(0.5);

    let overall_risk = (volatility_risk * 0.3
        + decline_risk * 0.3
        + timing_risk * 0.25
        + platform_risk * 0.15)
        .clamp(0.0, 1.0);

    TrendRiskAssessment {
        volatility_risk,
        decline_risk,
        timing_risk,
        platform_risk,
        overall_risk,
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
