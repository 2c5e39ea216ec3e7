//! GET /api/dashboard/stats: aggregated FinOps/GreenOps counters.

use axum::extract::State;
use axum::Json;

use crate::models::DashboardStats;
use crate::services::scoring;

use super::AppState;

/// Aggregated dashboard stats: total savings, CO2 avoided, checkpoints
/// saved and evictions handled.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Aggregated FinOps/GreenOps stats", body = DashboardStats),
    )
)]
pub async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(scoring::dashboard_stats(&state.stats))
}
