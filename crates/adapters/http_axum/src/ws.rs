//! `GET /ws` — WebSocket fan-out of broadcast envelopes.
//!
//! Each connection gets its own hub receiver. A failed or slow send closes
//! only that connection.

use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use homesync_domain::envelope::BroadcastEnvelope;
use homesync_domain::id::ClientId;

use crate::state::AppState;

/// Upper bound on a single send before the client is dropped.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// The half of a client connection the fan-out loop needs.
trait ClientSocket: Send {
    fn recv(&mut self) -> impl Future<Output = Option<Result<Message, axum::Error>>> + Send;

    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), axum::Error>> + Send;
}

impl ClientSocket for WebSocket {
    fn recv(&mut self) -> impl Future<Output = Option<Result<Message, axum::Error>>> + Send {
        WebSocket::recv(self)
    }

    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), axum::Error>> + Send {
        WebSocket::send(self, message)
    }
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let receiver = state.hub.subscribe();
    ws.on_upgrade(move |socket| serve(socket, receiver))
}

async fn serve<S: ClientSocket>(
    mut socket: S,
    mut receiver: broadcast::Receiver<BroadcastEnvelope>,
) {
    let client = ClientId::new();
    tracing::info!(%client, "websocket client connected");
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(%client, %err, "websocket receive failed");
                    break;
                }
            },
            next = receiver.recv() => match next {
                Ok(envelope) => {
                    if !send(&mut socket, client, &envelope).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%client, skipped, "websocket client lagged, envelopes were dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    tracing::info!(%client, "websocket client disconnected");
}

/// Returns `false` when the connection should be closed.
async fn send<S: ClientSocket>(socket: &mut S, client: ClientId, envelope: &BroadcastEnvelope) -> bool {
    let json = match serde_json::to_string(envelope) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(%client, %err, "failed to serialize envelope for websocket");
            return true;
        }
    };
    match tokio::time::timeout(SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(%client, %err, "websocket send failed, closing");
            false
        }
        Err(_) => {
            tracing::warn!(%client, "websocket send timed out, closing");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use homesync_app::broadcast_hub::BroadcastHub;
    use tower::ServiceExt;

    use super::*;

    /// A client that never reads and whose sends never complete.
    #[derive(Default)]
    struct Stalled {
        sends: Arc<AtomicUsize>,
    }

    impl ClientSocket for Stalled {
        fn recv(&mut self) -> impl Future<Output = Option<Result<Message, axum::Error>>> + Send {
            std::future::pending()
        }

        fn send(&mut self, _message: Message) -> impl Future<Output = Result<(), axum::Error>> + Send {
            self.sends.fetch_add(1, Ordering::SeqCst);
            std::future::pending()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_stalled_client_after_send_timeout() {
        let hub = Arc::new(BroadcastHub::default());
        let stalled = Stalled::default();
        let sends = Arc::clone(&stalled.sends);
        let mut healthy = hub.subscribe();
        let task = tokio::spawn(serve(stalled, hub.subscribe()));

        assert_eq!(hub.notify(BroadcastEnvelope::new("doorbell")).unwrap(), 2);
        assert_eq!(healthy.recv().await.unwrap().kind, "doorbell");

        tokio::time::sleep(SEND_TIMEOUT - Duration::from_secs(1)).await;
        assert!(!task.is_finished());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(task.is_finished());
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(hub.client_count(), 1);

        assert_eq!(hub.notify(BroadcastEnvelope::new("late")).unwrap(), 1);
        assert_eq!(healthy.recv().await.unwrap().kind, "late");
    }

    #[tokio::test]
    async fn should_refuse_plain_get_without_upgrade() {
        let hub = Arc::new(BroadcastHub::default());
        let app = crate::router::build(AppState::new(Arc::clone(&hub)));

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.status().is_client_error());
        assert_eq!(hub.client_count(), 0);
    }
}
