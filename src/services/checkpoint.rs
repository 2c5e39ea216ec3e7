//! Spot interruption simulator.
//!
//! Pure computation, no cloud calls: given a running job, synthesize the
//! checkpoint-and-migrate evacuation timeline to the neighbor AZ, bump the
//! persistent counters and emit the bus events the dashboard listens for.

use crate::catalog;
use crate::errors::AppError;
use crate::events::{
    CheckpointSavedPayload, EventBus, EventType, MigrationCompletePayload,
};
use crate::helpers::round2;
use crate::models::{CheckpointEvent, CheckpointSimulateRequest, TimelineStep};
use crate::services::stats::StatsStore;

/// Average intra-region S3 upload throughput, GB per second.
const S3_UPLOAD_GBPS: f64 = 1.2;

/// Checkpoint payload as a fraction of the model size (weights dominate).
const CHECKPOINT_SIZE_RATIO: f64 = 0.8;

/// Fallback migration target when the AZ is not in the neighbor map.
const DEFAULT_TARGET_AZ: &str = "fr-central-2";

/// Simulate the full evacuation protocol for a spot interruption.
///
/// The timeline is fixed-shape: notice, checkpoint save, upload, cordon,
/// re-provision in the neighbor AZ, download, resume. Only the upload leg
/// scales with the checkpoint size.
pub fn simulate_interruption(
    req: &CheckpointSimulateRequest,
    stats: &StatsStore,
    bus: &EventBus,
) -> Result<CheckpointEvent, AppError> {
    if !(0.0..=100.0).contains(&req.epoch_progress_pct) {
        return Err(AppError::BadRequest(
            "epoch_progress_pct must be between 0 and 100".to_string(),
        ));
    }
    if req.model_size_gb <= 0.0 {
        return Err(AppError::BadRequest(
            "model_size_gb must be positive".to_string(),
        ));
    }

    tracing::info!(
        "simulating spot interruption for job '{}' on {} in {}/{}",
        req.job_id,
        req.current_sku,
        req.current_region,
        req.current_az
    );

    let target_az = catalog::neighbor_az(&req.current_az).unwrap_or(DEFAULT_TARGET_AZ);

    let checkpoint_size_gb = req.model_size_gb * CHECKPOINT_SIZE_RATIO;
    let upload_duration_sec = checkpoint_size_gb / S3_UPLOAD_GBPS;

    let timeline = vec![
        TimelineStep {
            time_sec: 0.0,
            event: "Spot interruption notice received (cloud metadata endpoint)".to_string(),
        },
        TimelineStep {
            time_sec: 1.5,
            event: "Checkpoint save triggered: torch.save() issued".to_string(),
        },
        TimelineStep {
            time_sec: 1.5 + upload_duration_sec,
            event: format!("Checkpoint ({:.1} GB) uploaded to S3", checkpoint_size_gb),
        },
        TimelineStep {
            time_sec: 2.0 + upload_duration_sec,
            event: format!("kubectl cordon {}: node marked unschedulable", req.current_az),
        },
        TimelineStep {
            time_sec: 25.0 + upload_duration_sec,
            event: format!("New spot GPU provisioned in {}", target_az),
        },
        TimelineStep {
            time_sec: 35.0 + upload_duration_sec,
            event: "Checkpoint downloaded from S3: torch.load()".to_string(),
        },
        TimelineStep {
            time_sec: 40.0 + upload_duration_sec,
            event: format!(
                "Training resumed at {}% with zero progress lost",
                req.epoch_progress_pct
            ),
        },
    ];

    stats.record_checkpoint();
    stats.record_eviction();

    bus.emit(
        EventType::CheckpointEvent,
        &CheckpointSavedPayload {
            job_id: req.job_id.clone(),
            status: "saved",
            checkpoint_size_gb: round2(checkpoint_size_gb),
        },
    );
    bus.emit(
        EventType::MigrationComplete,
        &MigrationCompletePayload {
            job_id: req.job_id.clone(),
            from_az: req.current_az.clone(),
            to_az: target_az.to_string(),
            downtime_ms: 0,
            reason: "Spot interruption - AZ-hopping",
        },
    );

    Ok(CheckpointEvent {
        job_id: req.job_id.clone(),
        status: "migrated".to_string(),
        checkpoint_saved: true,
        checkpoint_size_gb: round2(checkpoint_size_gb),
        save_duration_sec: round2(upload_duration_sec),
        from_az: req.current_az.clone(),
        to_az: target_az.to_string(),
        downtime_ms: 0,
        epoch_progress_pct: req.epoch_progress_pct,
        resumed: true,
        timeline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(az: &str, model_size_gb: f64) -> CheckpointSimulateRequest {
        serde_json::from_value(serde_json::json!({
            "job_id": "fine-tune-llama-7b",
            "current_az": az,
            "model_size_gb": model_size_gb
        }))
        .unwrap()
    }

    fn store() -> (tempfile::TempDir, StatsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::load(dir.path().join("stats.json"));
        (dir, store)
    }

    #[test]
    fn test_migrates_to_neighbor_az() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let event = simulate_interruption(&request("fr-central-2", 14.0), &stats, &bus).unwrap();
        assert_eq!(event.to_az, "fr-central-3");

        let event = simulate_interruption(&request("fr-central-3", 14.0), &stats, &bus).unwrap();
        assert_eq!(event.to_az, "fr-central-1");
    }

    #[test]
    fn test_unknown_az_uses_default_target() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let event = simulate_interruption(&request("nowhere-9", 14.0), &stats, &bus).unwrap();
        assert_eq!(event.to_az, DEFAULT_TARGET_AZ);
    }

    #[test]
    fn test_checkpoint_size_and_upload_duration() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let event = simulate_interruption(&request("fr-central-1", 14.0), &stats, &bus).unwrap();
        // 14 GB model -> 11.2 GB checkpoint -> 11.2 / 1.2 = 9.33s upload.
        assert_eq!(event.checkpoint_size_gb, 11.2);
        assert!((event.save_duration_sec - 9.33).abs() < 0.01);
        assert!(event.checkpoint_saved);
        assert!(event.resumed);
        assert_eq!(event.downtime_ms, 0);
        assert_eq!(event.status, "migrated");
    }

    #[test]
    fn test_timeline_shape() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let event = simulate_interruption(&request("we-1", 12.0), &stats, &bus).unwrap();
        let upload = event.save_duration_sec;

        assert_eq!(event.timeline.len(), 7);
        assert_eq!(event.timeline[0].time_sec, 0.0);
        assert_eq!(event.timeline[1].time_sec, 1.5);
        assert!((event.timeline[2].time_sec - (1.5 + upload)).abs() < 0.01);
        assert!((event.timeline[4].time_sec - (25.0 + upload)).abs() < 0.01);
        assert!((event.timeline[6].time_sec - (40.0 + upload)).abs() < 0.01);
        // Timeline is monotonically increasing.
        for pair in event.timeline.windows(2) {
            assert!(pair[1].time_sec > pair[0].time_sec);
        }
    }

    #[test]
    fn test_stats_incremented_per_simulation() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        for _ in 0..3 {
            simulate_interruption(&request("uk-south-1", 10.0), &stats, &bus).unwrap();
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_checkpoints, 3);
        assert_eq!(snapshot.total_evictions, 3);
    }

    #[tokio::test]
    async fn test_emits_checkpoint_and_migration_events() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        simulate_interruption(&request("fr-central-1", 14.0), &stats, &bus).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::CheckpointEvent);
        assert_eq!(first.data["status"], "saved");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event_type, EventType::MigrationComplete);
        assert_eq!(second.data["from_az"], "fr-central-1");
        assert_eq!(second.data["to_az"], "fr-central-2");
        assert_eq!(second.data["downtime_ms"], 0);
    }

    #[test]
    fn test_rejects_invalid_progress() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let mut req = request("fr-central-1", 14.0);
        req.epoch_progress_pct = 120.0;
        let err = simulate_interruption(&req, &stats, &bus).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_rejects_nonpositive_model_size() {
        let (_dir, stats) = store();
        let bus = EventBus::new();
        let err = simulate_interruption(&request("fr-central-1", 0.0), &stats, &bus).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
