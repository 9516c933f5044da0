//! `POST /api/notify` — ingest an envelope and fan it out.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use homesync_domain::envelope::BroadcastEnvelope;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub delivered: usize,
}

/// Validates the envelope, stamps it if it has no timestamp and queues it
/// for every connected client. Answers `202 Accepted` with the number of
/// clients reached.
pub async fn notify(
    State(state): State<AppState>,
    Json(envelope): Json<BroadcastEnvelope>,
) -> Result<(StatusCode, Json<NotifyResponse>), ApiError> {
    let delivered = state.hub.notify(envelope)?;
    Ok((StatusCode::ACCEPTED, Json(NotifyResponse { delivered })))
}
