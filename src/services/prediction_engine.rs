use chrono::Utc;

use crate::models::{
    LifecycleStage, PredictionOutcome, TrendCorrelation, TrendPrediction, TrendSignal,
    LOW_DATA_CONFIDENCE,
};

/// Exponential smoothing factor for volume-growth forecasting.
const SMOOTHING_ALPHA: f64 = 0.3;

/// Minimum history before any model extrapolates.
const MIN_HISTORY_POINTS: usize = 3;

/// Forecast momentum at the end of the horizon by linear-regression
/// extrapolation over (time, momentum) pairs. Confidence is the clamped
/// R² of the fit.
pub fn predict_momentum(history: &[TrendSignal], horizon_hours: f64) -> TrendPrediction {
    let keyword = keyword_of(history);
    if history.len() < MIN_HISTORY_POINTS {
        return low_data_default(
            keyword,
            PredictionOutcome::Momentum {
                predicted_momentum: history.last().map(|s| s.momentum).unwrap_or(0.5),
            },
            horizon_hours,
        );
    }

    let points: Vec<(f64, f64)> = history
        .iter()
        .map(|s| (hours_since_first(history, s), s.momentum))
        .collect();

    let (slope, intercept, r_squared) = linear_regression(&points);
    let last_t = points.last().map(|(t, _)| *t).unwrap_or(0.0);
    let predicted = (slope * (last_t + horizon_hours) + intercept).clamp(0.0, 1.0);

    let mut factors = vec![format!(
        "linear momentum trend of {:+.4}/hour over {} observations",
        slope,
        history.len()
    )];
    if slope > 0.0 {
        factors.push("momentum still building".to_string());
    } else {
        factors.push("momentum flat or fading".to_string());
    }

    TrendPrediction {
        keyword,
        outcome: PredictionOutcome::Momentum {
            predicted_momentum: predicted,
        },
        confidence: r_squared.clamp(0.0, 1.0),
        horizon_hours,
        supporting_factors: factors,
        generated_at: Utc::now(),
    }
}

/// Forecast volume by exponential smoothing (α = 0.3) of historical
/// growth rates applied to the latest volume. Confidence shrinks as the
/// growth rates get noisier.
pub fn predict_volume_growth(history: &[TrendSignal], horizon_hours: f64) -> TrendPrediction {
    let keyword = keyword_of(history);
    let latest_volume = history.last().map(|s| s.volume).unwrap_or(0);
    if history.len() < MIN_HISTORY_POINTS {
        return low_data_default(
            keyword,
            PredictionOutcome::VolumeGrowth {
                predicted_volume: latest_volume,
                growth_rate: 0.0,
            },
            horizon_hours,
        );
    }

    let growth_rates: Vec<f64> = history
        .windows(2)
        .filter(|w| w[0].volume > 0)
        .map(|w| (w[1].volume as f64 - w[0].volume as f64) / w[0].volume as f64)
        .collect();

    if growth_rates.is_empty() {
        return low_data_default(
            keyword,
            PredictionOutcome::VolumeGrowth {
                predicted_volume: latest_volume,
                growth_rate: 0.0,
            },
            horizon_hours,
        );
    }

    let mut smoothed = growth_rates[0];
    for &rate in &growth_rates[1..] {
        smoothed = SMOOTHING_ALPHA * rate + (1.0 - SMOOTHING_ALPHA) * smoothed;
    }
    let smoothed = smoothed.clamp(-1.0, 5.0);

    // One smoothed growth step per historical inter-observation gap.
    let avg_gap_hours = (hours_since_first(history, history.last().unwrap())
        / (history.len() - 1) as f64)
        .max(1.0);
    let steps = (horizon_hours / avg_gap_hours).max(0.0);
    let predicted_volume =
        ((latest_volume as f64) * (1.0 + smoothed).powf(steps)).max(0.0) as u64;

    let variance = variance(&growth_rates);
    let confidence = (1.0 / (1.0 + variance * 10.0)).clamp(0.0, 1.0);

    TrendPrediction {
        keyword,
        outcome: PredictionOutcome::VolumeGrowth {
            predicted_volume,
            growth_rate: smoothed,
        },
        confidence,
        horizon_hours,
        supporting_factors: vec![
            format!("smoothed growth rate {:+.3} per observation", smoothed),
            format!("growth-rate variance {:.4}", variance),
        ],
        generated_at: Utc::now(),
    }
}

/// Forecast the next lifecycle stage from a fixed transition matrix,
/// tilted by the observed momentum and volume trend directions:
/// positive trends favor progression, negative favor decline.
pub fn predict_lifecycle_transition(
    history: &[TrendSignal],
    current_stage: LifecycleStage,
    horizon_hours: f64,
) -> TrendPrediction {
    let keyword = keyword_of(history);
    if history.len() < MIN_HISTORY_POINTS {
        return low_data_default(
            keyword,
            PredictionOutcome::LifecycleTransition {
                next_stage: current_stage,
                estimated_hours: horizon_hours,
            },
            horizon_hours,
        );
    }

    let momentum_trend = trend_of(history, |s| s.momentum);
    let volume_trend = trend_of(history, |s| s.volume as f64);
    let tilt = trend_tilt(momentum_trend, volume_trend);

    let mut candidates = base_transitions(current_stage);
    for (stage, probability) in candidates.iter_mut() {
        if is_progression(current_stage, *stage) {
            *probability *= 1.0 + tilt;
        } else if is_decline(current_stage, *stage) {
            *probability *= 1.0 - tilt;
        }
        *probability = probability.max(0.0);
    }

    let total: f64 = candidates.iter().map(|(_, p)| p).sum();
    let (next_stage, probability) = candidates
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((current_stage, 1.0));
    let confidence = if total > 0.0 {
        (probability / total).clamp(0.0, 1.0)
    } else {
        LOW_DATA_CONFIDENCE
    };

    // Strong trends compress the expected dwell time in the current
    // stage; weak ones stretch it.
    let trend_strength = (momentum_trend.abs() * 10.0).clamp(0.0, 1.0);
    let estimated_hours = stage_base_duration_hours(current_stage) * (1.0 - 0.5 * trend_strength);

    TrendPrediction {
        keyword,
        outcome: PredictionOutcome::LifecycleTransition {
            next_stage,
            estimated_hours,
        },
        confidence,
        horizon_hours,
        supporting_factors: vec![
            format!("current stage {}", current_stage),
            format!("momentum trend {:+.4}, volume trend {:+.1}", momentum_trend, volume_trend),
        ],
        generated_at: Utc::now(),
    }
}

/// Forecast hours until the trend peaks from the rate of change of the
/// momentum and volume trajectories. A significant leading correlation
/// shifts the estimate by its lag.
pub fn predict_peak_timing(
    history: &[TrendSignal],
    correlations: &[TrendCorrelation],
    horizon_hours: f64,
) -> TrendPrediction {
    let keyword = keyword_of(history);
    if history.len() < MIN_HISTORY_POINTS {
        return low_data_default(
            keyword,
            PredictionOutcome::PeakTiming {
                hours_to_peak: horizon_hours / 2.0,
            },
            horizon_hours,
        );
    }

    let momentum_rate = trend_of(history, |s| s.momentum);
    let volume_rate = trend_of(history, |s| s.volume as f64);
    let mut factors = Vec::new();

    let mut hours_to_peak = if momentum_rate > 0.01 {
        // Still climbing: scale the horizon by how far momentum can run.
        let headroom = 1.0 - history.last().map(|s| s.momentum).unwrap_or(0.5);
        factors.push("momentum still rising".to_string());
        (headroom / momentum_rate).clamp(horizon_hours * 0.25, horizon_hours)
    } else if momentum_rate < -0.01 {
        factors.push("momentum falling, peak imminent or passed".to_string());
        0.0
    } else {
        factors.push("momentum flat near peak".to_string());
        horizon_hours * 0.25
    };

    if volume_rate < 0.0 && hours_to_peak > 0.0 {
        factors.push("volume already contracting".to_string());
        hours_to_peak *= 0.5;
    }

    if let Some(lead) = correlations.iter().find(|c| c.is_actionable_lead()) {
        factors.push(format!(
            "leading correlation with '{}' ({} hour lag)",
            lead.keyword_a, lead.lag_hours
        ));
        hours_to_peak = (hours_to_peak + lead.lag_hours as f64).max(0.0);
    }

    // Sharper slopes mean clearer shape near the peak.
    let confidence = (0.4 + momentum_rate.abs() * 20.0).clamp(0.0, 0.9);

    TrendPrediction {
        keyword,
        outcome: PredictionOutcome::PeakTiming { hours_to_peak },
        confidence,
        horizon_hours,
        supporting_factors: factors,
        generated_at: Utc::now(),
    }
}

fn keyword_of(history: &[TrendSignal]) -> String {
    history
        .last()
        .map(|s| s.keyword.clone())
        .unwrap_or_default()
}

fn hours_since_first(history: &[TrendSignal], signal: &TrendSignal) -> f64 {
    let first = history.first().expect("non-empty history");
    (signal.timestamp - first.timestamp).num_seconds() as f64 / 3_600.0
}

fn low_data_default(
    keyword: String,
    outcome: PredictionOutcome,
    horizon_hours: f64,
) -> TrendPrediction {
    TrendPrediction {
        keyword,
        outcome,
        confidence: LOW_DATA_CONFIDENCE,
        horizon_hours,
        supporting_factors: vec!["insufficient history, returning default".to_string()],
        generated_at: Utc::now(),
    }
}

/// Least-squares fit returning (slope, intercept, R²).
fn linear_regression(points: &[(f64, f64)]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in points {
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }
    if denominator == 0.0 {
        return (0.0, y_mean, 0.0);
    }
    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;

    let ss_total: f64 = points.iter().map(|(_, y)| (y - y_mean).powi(2)).sum();
    let ss_residual: f64 = points
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_total == 0.0 {
        // A perfectly flat series is perfectly predicted by the fit.
        1.0
    } else {
        1.0 - ss_residual / ss_total
    };

    (slope, intercept, r_squared)
}

fn trend_of(history: &[TrendSignal], extract: impl Fn(&TrendSignal) -> f64) -> f64 {
    let values: Vec<(f64, f64)> = history
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, extract(s)))
        .collect();
    let recent = &values[values.len().saturating_sub(5)..];
    linear_regression(recent).0
}

/// How strongly the observed trends push toward progression, [-0.5,0.5].
fn trend_tilt(momentum_trend: f64, volume_trend: f64) -> f64 {
    let momentum_push = (momentum_trend * 10.0).clamp(-1.0, 1.0);
    let volume_push = volume_trend.signum() * 0.5;
    ((momentum_push + volume_push) / 2.0).clamp(-1.0, 1.0) * 0.5
}

fn base_transitions(stage: LifecycleStage) -> Vec<(LifecycleStage, f64)> {
    match stage {
        LifecycleStage::Emerging => vec![
            (LifecycleStage::Growing, 0.55),
            (LifecycleStage::Emerging, 0.25),
            (LifecycleStage::Declining, 0.2),
        ],
        LifecycleStage::Growing => vec![
            (LifecycleStage::Peak, 0.5),
            (LifecycleStage::Growing, 0.3),
            (LifecycleStage::Declining, 0.2),
        ],
        LifecycleStage::Peak => vec![
            (LifecycleStage::Declining, 0.6),
            (LifecycleStage::Peak, 0.3),
            (LifecycleStage::Growing, 0.1),
        ],
        LifecycleStage::Declining => vec![
            (LifecycleStage::Dormant, 0.5),
            (LifecycleStage::Declining, 0.35),
            (LifecycleStage::Growing, 0.15),
        ],
        LifecycleStage::Dormant => vec![
            (LifecycleStage::Dormant, 0.8),
            (LifecycleStage::Emerging, 0.2),
        ],
    }
}

fn is_progression(from: LifecycleStage, to: LifecycleStage) -> bool {
    matches!(
        (from, to),
        (LifecycleStage::Emerging, LifecycleStage::Growing)
            | (LifecycleStage::Growing, LifecycleStage::Peak)
            | (LifecycleStage::Declining, LifecycleStage::Growing)
            | (LifecycleStage::Peak, LifecycleStage::Growing)
            | (LifecycleStage::Dormant, LifecycleStage::Emerging)
    )
}

fn is_decline(from: LifecycleStage, to: LifecycleStage) -> bool {
    matches!(
        (from, to),
        (LifecycleStage::Emerging, LifecycleStage::Declining)
            | (LifecycleStage::Growing, LifecycleStage::Declining)
            | (LifecycleStage::Peak, LifecycleStage::Declining)
            | (LifecycleStage::Declining, LifecycleStage::Dormant)
    )
}

/// Typical dwell time in each stage before a transition, hours.
fn stage_base_duration_hours(stage: LifecycleStage) -> f64 {
    match stage {
        LifecycleStage::Emerging => 36.0,
        LifecycleStage::Growing => 96.0,
        LifecycleStage::Peak => 72.0,
        LifecycleStage::Declining => 168.0,
        LifecycleStage::Dormant => 720.0,
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
