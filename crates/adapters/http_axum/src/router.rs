//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the hub API under `/api` and mounts the WebSocket at `/ws`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(crate::ws::upgrade))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use homesync_app::broadcast_hub::BroadcastHub;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let app = build(AppState::new(Arc::new(BroadcastHub::default())));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_return_not_found_when_route_unknown() {
        let app = build(AppState::new(Arc::new(BroadcastHub::default())));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
