//! JSON and streaming API handlers, nested under `/api`.

pub mod notify;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notify", post(notify::notify))
        .route("/events/stream", get(sse::stream))
}
