use std::sync::Arc;

use homesync_adapter_http_axum::router;
use homesync_adapter_http_axum::state::AppState;
use homesync_adapter_storage_sqlite_sqlx::kv_store::SqliteKeyValueStore;
use homesync_adapter_storage_sqlite_sqlx::pool::Config as DatabaseConfig;
use homesync_app::auth::AuthSession;
use homesync_app::broadcast_hub::BroadcastHub;
use homesyncd::config::Config;
use homesyncd::engine::ClientEngine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Persistence
    let db = DatabaseConfig {
        database_url: config.storage.url.clone(),
    }
    .build()
    .await?;
    let kv = Arc::new(SqliteKeyValueStore::open(db.pool().clone()).await?);
    let session = Arc::new(AuthSession::new(Arc::clone(&kv)));
    tracing::info!(state = ?session.state(), "auth session restored");

    // Client engine
    let engine = match config.relay.base_url.clone() {
        Some(relay_url) => {
            tracing::info!(%relay_url, "starting client engine");
            Some(ClientEngine::start(&config, relay_url, session))
        }
        None => {
            tracing::info!("no relay configured, client engine disabled");
            None
        }
    };

    // Broadcast hub
    if config.server.enabled {
        let hub = Arc::new(BroadcastHub::new(config.hub.capacity));
        let app = router::build(AppState::new(hub));
        let bind_addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!(%bind_addr, "homesyncd listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    if let Some(engine) = engine {
        engine.shutdown().await;
    }
    kv.flush().await;
    tracing::info!("homesyncd stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
