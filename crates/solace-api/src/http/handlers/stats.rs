//! Admission statistics endpoint.
//!
//! GET /api/v1/admission/stats - Tracked windows, identities and in-flight
//! requests, plus the persisted transcript count when SQLite is enabled.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use solace_types::admission::AdmissionStats;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsPayload {
    pub admission: AdmissionStats,
    pub max_concurrent: u32,
    /// `None` when transcripts are not persisted.
    pub transcripts: Option<u64>,
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatsPayload>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let transcripts = match &state.transcripts {
        Some(store) => Some(
            store
                .count()
                .await
                .map_err(|e| AppError::Internal(format!("Failed to count transcripts: {e}")))?,
        ),
        None => None,
    };

    let data = StatsPayload {
        admission: state.admission().stats(),
        max_concurrent: state.config.admission.max_concurrent,
        transcripts,
    };

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}
