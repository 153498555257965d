//! GET /health - liveness probe (no identity required).

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "generator": state.pipeline.generator_name(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
