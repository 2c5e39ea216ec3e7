//! POST /api/checkpoint/simulate: simulate a spot interruption and the
//! checkpoint-and-migrate evacuation to the neighbor AZ.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::models::{CheckpointEvent, CheckpointSimulateRequest};
use crate::services::checkpoint;

use super::AppState;

/// Simulate a spot interruption.
///
/// Synthesizes the evacuation timeline (notice, checkpoint save, upload,
/// cordon, re-provision, resume), bumps the checkpoint/eviction counters and
/// publishes the events on the live feed.
#[utoipa::path(
    post,
    path = "/api/checkpoint/simulate",
    tag = "Checkpointing",
    request_body = CheckpointSimulateRequest,
    responses(
        (status = 200, description = "Migration timeline", body = CheckpointEvent),
        (status = 400, description = "Invalid request parameters", body = ErrorResponse),
    )
)]
pub async fn checkpoint_simulate(
    State(state): State<AppState>,
    Json(req): Json<CheckpointSimulateRequest>,
) -> Result<Json<CheckpointEvent>, AppError> {
    let event = checkpoint::simulate_interruption(&req, &state.stats, &state.bus)?;
    Ok(Json(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_state;

    #[tokio::test]
    async fn test_checkpoint_simulate_migrates() {
        let (_dir, state) = test_state();
        let req: CheckpointSimulateRequest = serde_json::from_value(serde_json::json!({
            "job_id": "fine-tune-llama-7b",
            "current_az": "we-3"
        }))
        .unwrap();
        let response = checkpoint_simulate(State(state.clone()), Json(req))
            .await
            .unwrap();
        assert_eq!(response.0.from_az, "we-3");
        assert_eq!(response.0.to_az, "we-1");
        assert_eq!(state.stats.snapshot().total_evictions, 1);
    }
}
