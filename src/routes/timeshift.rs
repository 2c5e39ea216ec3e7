//! POST /api/timeshifting/plan: deadline in, optimal start window out.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::models::{TimeShiftPlan, TimeShiftRequest};
use crate::services::timeshift;

use super::AppState;

/// Compute the optimal start window for a deferrable job.
///
/// Builds 24h price and carbon curves from live observations and searches
/// every feasible start offset before the deadline.
#[utoipa::path(
    post,
    path = "/api/timeshifting/plan",
    tag = "Time-Shifting",
    request_body = TimeShiftRequest,
    responses(
        (status = 200, description = "Time-shift plan", body = TimeShiftPlan),
        (status = 400, description = "Invalid request parameters", body = ErrorResponse),
    )
)]
pub async fn plan_timeshift(
    State(state): State<AppState>,
    Json(req): Json<TimeShiftRequest>,
) -> Result<Json<TimeShiftPlan>, AppError> {
    if req.estimated_gpu_hours <= 0.0 {
        return Err(AppError::BadRequest(
            "estimated_gpu_hours must be positive".to_string(),
        ));
    }
    let plan = timeshift::compute_plan(
        &req,
        &state.cache,
        state.config.timeshift_min_reduction_pct,
    )
    .await;
    Ok(Json(plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_state;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_plan_rejects_nonpositive_hours() {
        let (_dir, state) = test_state();
        let req: TimeShiftRequest = serde_json::from_value(serde_json::json!({
            "deadline": (Utc::now() + Duration::hours(10)).to_rfc3339(),
            "estimated_gpu_hours": -1.0
        }))
        .unwrap();
        let err = plan_timeshift(State(state), Json(req)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_plan_infeasible_deadline() {
        let (_dir, state) = test_state();
        let req: TimeShiftRequest = serde_json::from_value(serde_json::json!({
            "deadline": (Utc::now() + Duration::minutes(10)).to_rfc3339(),
            "estimated_gpu_hours": 8.0
        }))
        .unwrap();
        let response = plan_timeshift(State(state), Json(req)).await.unwrap();
        assert!(!response.0.recommended);
        assert!(!response.0.meets_deadline);
    }
}
