//! Server-Sent Events (SSE) for generation progress streaming

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Optional filter for GET /api/events
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only forward events of this session
    pub session_id: Option<Uuid>,
}

/// GET /api/events - SSE event stream for generation progress
///
/// Streams events:
/// - GenerationStarted
/// - PromptSynthesized
/// - TaskCreated
/// - TaskStatusChanged
/// - GenerationCompleted / GenerationFailed / GenerationCancelled
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(session_id = ?filter.session_id, "New SSE client connected to generation events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: Client lagged, {} events skipped", skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if filter.session_id.is_some_and(|id| id != event.session_id()) {
                        continue;
                    }

                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

/// Build event stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(event_stream))
}
