//! Real-time event bus.
//!
//! A bounded `tokio::sync::broadcast` channel fans out event envelopes to
//! subscribers (the SSE feed). Subscribers that fall behind the channel
//! capacity lose the oldest events rather than blocking the scraper; a
//! subscriber whose receiver is dropped simply disappears from the fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

/// Bounded per-subscriber buffer. Emission never blocks.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event discriminator carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AzPriceUpdate,
    CheckpointEvent,
    MigrationComplete,
    TimeshiftScheduled,
    SpotInterruption,
}

/// Envelope wrapping every event: `{type, timestamp, ...payload fields}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

/// Spot price moved for a SKU between two scrape cycles.
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdatePayload {
    pub region: String,
    pub az: String,
    pub sku: String,
    pub gpu_name: String,
    pub old_price: f64,
    pub new_price: f64,
    pub currency: &'static str,
}

/// A checkpoint was written during a simulated interruption.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSavedPayload {
    pub job_id: String,
    pub status: &'static str,
    pub checkpoint_size_gb: f64,
}

/// A simulated AZ-hop migration finished.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationCompletePayload {
    pub job_id: String,
    pub from_az: String,
    pub to_az: String,
    pub downtime_ms: u64,
    pub reason: &'static str,
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Cloneable handle to the broadcast bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emit a typed payload under the given event type. The envelope gets the
    /// current UTC timestamp. Emission is fire-and-forget: with no
    /// subscribers the event is dropped.
    pub fn emit<T: Serialize>(&self, event_type: EventType, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("failed to serialize {:?} event payload: {}", event_type, e);
                return;
            }
        };
        let envelope = EventEnvelope {
            event_type,
            timestamp: Utc::now(),
            data,
        };
        // send() errors only when there are no receivers; that is fine.
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_delivers_envelope_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(
            EventType::AzPriceUpdate,
            &PriceUpdatePayload {
                region: "francecentral".to_string(),
                az: "fr-central-1".to_string(),
                sku: "Standard_NC6s_v3".to_string(),
                gpu_name: "Tesla V100 (16GB)".to_string(),
                old_price: 0.66,
                new_price: 0.71,
                currency: "USD",
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, EventType::AzPriceUpdate);
        assert_eq!(envelope.data["sku"], "Standard_NC6s_v3");
        assert_eq!(envelope.data["currency"], "USD");
    }

    #[test]
    fn test_envelope_serializes_flat() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(
            EventType::MigrationComplete,
            &MigrationCompletePayload {
                job_id: "job-1".to_string(),
                from_az: "fr-central-1".to_string(),
                to_az: "fr-central-2".to_string(),
                downtime_ms: 0,
                reason: "Spot interruption - AZ-hopping",
            },
        );
        let envelope = tokio_test::block_on(rx.recv()).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        // Payload fields sit at the top level next to type/timestamp.
        assert_eq!(json["type"], "migration_complete");
        assert_eq!(json["from_az"], "fr-central-1");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit(
            EventType::SpotInterruption,
            &serde_json::json!({"job_id": "job-1"}),
        );
        assert_eq!(bus.subscriber_count(), 0);
    }
}
