//! End-to-end tests for the full homesyncd stack.
//!
//! Each test binds real axum servers on ephemeral local ports (the broadcast
//! hub, or a fake relay) and drives the client engine against them over
//! HTTP and SSE.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, put};
use homesync_adapter_http_axum::router;
use homesync_adapter_http_axum::state::AppState;
use homesync_adapter_storage_sqlite_sqlx::kv_store::SqliteKeyValueStore;
use homesync_adapter_storage_sqlite_sqlx::pool::Config as DatabaseConfig;
use homesync_app::auth::AuthSession;
use homesync_app::broadcast_hub::BroadcastHub;
use homesync_app::ports::{CommandRequest, Method};
use homesync_domain::auth::AuthTokens;
use homesync_domain::entity::{AttributeKey, Attributes};
use homesync_domain::error::{CommandError, SyncError};
use homesync_domain::id::EntityId;
use homesyncd::config::Config;
use homesyncd::engine::ClientEngine;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn session(token: Option<&str>) -> Arc<AuthSession<SqliteKeyValueStore>> {
    let db = DatabaseConfig {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .unwrap();
    let session = AuthSession::new(SqliteKeyValueStore::open(db.pool().clone()).await.unwrap());
    if let Some(token) = token {
        session.login(&AuthTokens {
            access_token: token.to_string(),
            refresh_token: None,
            expires_at: None,
        });
    }
    Arc::new(session)
}

/// Poll `condition` until it holds, failing after five seconds.
async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn id(raw: &str) -> EntityId {
    EntityId::new(raw).unwrap()
}

// ---------------------------------------------------------------------------
// Hub → SSE → store
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_deliver_notified_envelope_to_store_over_sse() {
    let hub = Arc::new(BroadcastHub::default());
    let base = serve(router::build(AppState::new(Arc::clone(&hub)))).await;
    let engine = ClientEngine::start(&Config::default(), base.clone(), session(None).await);
    eventually(|| engine.transport().is_connected()).await;
    eventually(|| hub.client_count() > 0).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/notify"))
        .json(&serde_json::json!({
            "type": "device_state",
            "deviceId": "457",
            "attributes": {"switch": "on", "level": 40}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    eventually(|| {
        engine.store().get(&id("457")).get(&AttributeKey::Switch) == Some(&"on".into())
    })
    .await;
    assert_eq!(
        engine.store().get(&id("457")).get(&AttributeKey::Level),
        Some(&40_i64.into())
    );

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn should_publish_relay_status_frames() {
    let hub = Arc::new(BroadcastHub::default());
    let base = serve(router::build(AppState::new(Arc::clone(&hub)))).await;
    let engine = ClientEngine::start(&Config::default(), base, session(None).await);
    eventually(|| hub.client_count() > 0).await;
    let mut status = engine.auth_status();

    hub.notify(
        homesync_domain::envelope::BroadcastEnvelope::new("status")
            .with_payload(serde_json::json!({"loggedIn": true, "connectedToMiddleware": true})),
    )
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), status.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(status.borrow().logged_in);

    engine.shutdown().await;
}

// ---------------------------------------------------------------------------
// Polling fallback
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_import_snapshot_while_push_unavailable() {
    let relay = Router::new()
        .route(
            "/api/devices",
            get(|| async {
                axum::Json(serde_json::json!([
                    {"deviceId": "457", "attributes": {"switch": "on"}, "timestamp": 1000}
                ]))
            }),
        )
        .route("/api/player", get(|| async { StatusCode::NO_CONTENT }));
    let base = serve(relay).await;

    let engine = ClientEngine::start(&Config::default(), base, session(None).await);

    eventually(|| {
        engine.store().get(&id("457")).get(&AttributeKey::Switch) == Some(&"on".into())
    })
    .await;
    assert!(!engine.transport().is_connected());

    engine.shutdown().await;
}

// ---------------------------------------------------------------------------
// Optimistic commands
// ---------------------------------------------------------------------------

fn relay_answering(status: StatusCode) -> Router {
    Router::new().route("/api/devices/{id}", put(move || async move { status }))
}

fn switch(value: &str) -> Attributes {
    Attributes::new().with(AttributeKey::Switch, value)
}

#[tokio::test(flavor = "multi_thread")]
async fn should_keep_optimistic_value_when_command_succeeds() {
    let base = serve(relay_answering(StatusCode::NO_CONTENT)).await;
    let engine = ClientEngine::start(&Config::default(), base, session(Some("token")).await);

    let response = engine
        .send_command(
            &id("457"),
            switch("on"),
            CommandRequest::new(Method::Put, "/api/devices/457"),
        )
        .await
        .unwrap();

    assert!(response.is_no_content());
    assert_eq!(
        engine.store().get(&id("457")).get(&AttributeKey::Switch),
        Some(&"on".into())
    );

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn should_roll_back_when_command_fails() {
    let base = serve(relay_answering(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let engine = ClientEngine::start(&Config::default(), base, session(Some("token")).await);

    let result = engine
        .send_command(
            &id("457"),
            switch("on"),
            CommandRequest::new(Method::Put, "/api/devices/457"),
        )
        .await;

    assert!(matches!(
        result,
        Err(SyncError::Command(CommandError::Status { status: 500 }))
    ));
    assert_eq!(engine.store().get(&id("457")).get(&AttributeKey::Switch), None);
    assert!(engine.store().pending_command(&id("457")).is_none());

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn should_fail_fast_without_session() {
    let base = serve(relay_answering(StatusCode::NO_CONTENT)).await;
    let engine = ClientEngine::start(&Config::default(), base, session(None).await);

    let result = engine
        .send_command(
            &id("457"),
            switch("on"),
            CommandRequest::new(Method::Put, "/api/devices/457"),
        )
        .await;

    assert!(matches!(result, Err(SyncError::Unauthenticated)));
    assert_eq!(engine.store().get(&id("457")).get(&AttributeKey::Switch), None);

    engine.shutdown().await;
}
