//! Server-Sent Events (SSE) utilities
//!
//! Streams loading state to browser clients. The handler that mounts the
//! stream (and its route) belongs to the consuming service.

use crate::loading::{LoadingEventBridge, LoadingRegistry, LoadingUpdate};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// SSE event name used for every loading state message
pub const LOADING_STATE_EVENT: &str = "LoadingState";

/// Build the SSE event for one update (`None` if serialization fails)
pub fn loading_state_event(update: &LoadingUpdate) -> Option<Event> {
    match Event::default()
        .event(LOADING_STATE_EVENT)
        .id(update.version.to_string())
        .json_data(update)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("SSE: Failed to serialize loading update {}: {}", update.version, e);
            None
        }
    }
}

/// Create an SSE stream of loading state for one client
///
/// Sends the current state immediately, then one `LoadingState` event per
/// registry change. Updates at or below the initial version are skipped so
/// the client never steps backwards. Lagging clients skip ahead; each event
/// carries the full state.
///
/// # Example
/// ```rust,ignore
/// pub async fn loading_events(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     scroll_common::sse::create_loading_sse_stream(&state.loading, &state.loading_events)
/// }
/// ```
pub fn create_loading_sse_stream(
    registry: &LoadingRegistry,
    bridge: &LoadingEventBridge,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so no change falls in between
    let mut rx = bridge.subscribe();
    let initial = LoadingUpdate::from_snapshot(&registry.snapshot());
    let heartbeat = Duration::from_secs(registry.config().heartbeat_secs.max(1));

    info!("New SSE client connected to loading events");

    let stream = async_stream::stream! {
        let mut last_version = initial.version;
        if let Some(event) = loading_state_event(&initial) {
            yield Ok(event);
        }

        loop {
            match rx.recv().await {
                Ok(update) => {
                    if update.version <= last_version {
                        continue;
                    }
                    last_version = update.version;
                    if let Some(event) = loading_state_event(&update) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: Loading client lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: Loading event bridge closed, ending stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat"))
}
