//! Shared application state for axum handlers.

use std::sync::Arc;

use homesync_app::broadcast_hub::BroadcastHub;

/// Application state shared across all axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    #[must_use]
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }
}
