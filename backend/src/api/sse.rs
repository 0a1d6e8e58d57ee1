//! Server-Sent Events endpoint for lineup and stream updates.

use axum::extract::State;
use axum::response::sse::Sse;
use futures::Stream;
use std::convert::Infallible;
use tracing::info;

use crate::state::AppState;

/// Subscribe to Server-Sent Events.
///
/// Each event is a JSON-encoded `TunerEvent`: channel edits, probe results
/// and viewers tuning in, restarting or leaving.
pub async fn events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    info!(
        "New SSE client connected (total subscribers: {})",
        state.events().subscriber_count() + 1
    );
    state.events().subscribe()
}
