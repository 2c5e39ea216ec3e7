//! POST /api/simulate: submit a job, get the best placement plus savings.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::models::{SimulateRequest, SimulateResponse};
use crate::services::scoring;

use super::AppState;

/// Simulate job placement.
///
/// Scores every (region, AZ, SKU) candidate against live prices, carbon and
/// weather, and returns the decision, the standby fallback, checkpointing
/// config, savings, carbon impact and the full server path.
#[utoipa::path(
    post,
    path = "/api/simulate",
    tag = "Simulation",
    request_body = SimulateRequest,
    responses(
        (status = 200, description = "Best placement with savings breakdown", body = SimulateResponse),
        (status = 400, description = "Invalid request parameters", body = ErrorResponse),
        (status = 422, description = "No candidate satisfies the job constraints", body = ErrorResponse),
    )
)]
pub async fn simulate_job(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, AppError> {
    let response = scoring::run_simulation(
        &req,
        &state.cache,
        &state.stats,
        state.config.timeshift_min_reduction_pct,
    )
    .await?;
    Ok(Json(response))
}
