//! Server-Sent Events (SSE) stream of broadcast envelopes.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::state::AppState;

/// `GET /api/events/stream` — SSE stream of broadcast envelopes.
///
/// Each envelope becomes one frame whose `event:` is the envelope type and
/// whose `data:` is the JSON envelope. The stream only carries envelopes
/// sent after the client connected.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let receiver = state.hub.subscribe();
    tracing::debug!(clients = state.hub.client_count(), "sse client connected");
    let events = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(envelope) => match serde_json::to_string(&envelope) {
            Ok(json) => Some(Ok(Event::default().event(envelope.kind).data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize envelope for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged, envelopes were dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
