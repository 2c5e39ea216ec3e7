//! GET /api/events/feed: server-sent event stream of live engine events.
//!
//! Each frame is one JSON envelope `{type, timestamp, ...}`. Subscribers
//! that lag past the channel capacity skip the missed events and continue;
//! disconnecting drops the subscription.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::AppState;

/// Live event feed (SSE).
#[utoipa::path(
    get,
    path = "/api/events/feed",
    tag = "Events",
    responses(
        (status = 200, description = "SSE stream of event envelopes"),
    )
)]
pub async fn event_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.bus.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(envelope) => match Event::default().json_data(&envelope) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("failed to serialize SSE event: {}", e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::debug!("SSE subscriber lagged, skipped {} events", missed);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
