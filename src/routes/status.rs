//! GET /api/scraper/status: scrape-loop health for operators.

use axum::extract::State;
use axum::Json;

use crate::cache::ScraperStatus;

use super::AppState;

/// Scraper status: last scrape time, cycle count, per-region history depth
/// and the most recent fetch errors.
#[utoipa::path(
    get,
    path = "/api/scraper/status",
    tag = "System",
    responses(
        (status = 200, description = "Background scraper status", body = ScraperStatus),
    )
)]
pub async fn scraper_status(State(state): State<AppState>) -> Json<ScraperStatus> {
    Json(state.cache.status().await)
}
