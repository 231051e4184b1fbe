use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Read-only operational snapshots: per-platform stream status, per-API
/// rate/budget summaries and circuit/health summaries, current
/// opportunities and the selected portfolio. Always answers from the
/// latest in-memory state, degraded platforms included.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/streams", get(stream_status))
        .route("/quotas", get(quota_status))
        .route("/apis", get(api_health))
        .route("/opportunities", get(opportunities))
        .route("/portfolio", get(portfolio))
        .route("/jobs", get(job_runs))
}

async fn stream_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "streams": state.coordinator.status() }))
}

async fn quota_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let quotas: Vec<_> = crate::models::Platform::all()
        .iter()
        .filter_map(|&p| state.rate.remaining_quota(p))
        .collect();
    Json(json!({
        "quotas": quotas,
        "costs": state.rate.cost_summary(),
    }))
}

async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "apis": state.monitor.all_summaries() }))
}

async fn opportunities(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "opportunities": state.opportunities.all() }))
}

async fn portfolio(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.mapper.config().clone();
    let selected = state.mapper.select_portfolio(
        &state.opportunities.all(),
        config.max_positions,
        config.max_sector_exposure_pct,
    );
    let deployed: f64 = selected.iter().map(|o| o.position_size_pct).sum();
    Json(json!({
        "positions": selected,
        "total_position_pct": deployed,
    }))
}

async fn job_runs(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "runs": state.job_runs.recent() }))
}
