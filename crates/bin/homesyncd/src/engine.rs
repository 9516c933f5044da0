//! Client engine — the sync core wired to the relay over HTTP.

use std::sync::Arc;

use homesync_adapter_reqwest::command::HttpCommandClient;
use homesync_adapter_reqwest::refresh::HttpTokenRefresher;
use homesync_adapter_reqwest::snapshot::HttpSnapshotSource;
use homesync_adapter_reqwest::sse::SseConnector;
use homesync_app::auth::{AuthSession, AuthenticatedCommand};
use homesync_app::base_url::{SharedBaseUrl, follow_base_url};
use homesync_app::coordinator::OptimisticCoordinator;
use homesync_app::dispatcher::FrameDispatcher;
use homesync_app::polling::PollingFallback;
use homesync_app::ports::{CommandRequest, KeyValueStore, RemoteResponse};
use homesync_app::stale_null::StaleNullGuard;
use homesync_app::store::StateStore;
use homesync_app::subscriptions::{Subscription, SubscriptionFabric};
use homesync_app::transport::{TransportController, TransportHandle};
use homesync_domain::auth::AuthStatus;
use homesync_domain::entity::Attributes;
use homesync_domain::error::SyncError;
use homesync_domain::id::EntityId;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;

type Commands<K> =
    AuthenticatedCommand<HttpCommandClient<SharedBaseUrl>, HttpTokenRefresher<SharedBaseUrl>, K>;

/// A running client engine.
pub struct ClientEngine<K> {
    store: StateStore,
    coordinator: OptimisticCoordinator,
    commands: Commands<K>,
    base_url: SharedBaseUrl,
    transport: TransportHandle,
    auth_status: watch::Receiver<AuthStatus>,
    transport_task: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
    _subscriptions: Vec<Subscription>,
}

impl<K: KeyValueStore> ClientEngine<K> {
    /// Wire everything and start following `relay_url`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config, relay_url: impl Into<String>, session: Arc<AuthSession<K>>) -> Self {
        let http = reqwest::Client::new();
        let base_url = SharedBaseUrl::new(relay_url);

        let fabric = SubscriptionFabric::new();
        let store = StateStore::new(config.store_config(), fabric.clone());
        let dispatcher = Arc::new(FrameDispatcher::new(
            store.clone(),
            StaleNullGuard::new(config.stale_null_window()),
        ));

        let (transport, transport_task) = TransportController::spawn(
            SseConnector::new(http.clone()),
            Arc::clone(&dispatcher),
            config.backoff_config(),
        );
        let follower = follow_base_url(&base_url, transport.clone(), config.relay.stream_path.clone());

        let source = HttpSnapshotSource::new(http.clone(), base_url.clone())
            .with_paths(&config.relay.devices_path, &config.relay.player_path);
        let poller = Arc::new(PollingFallback::new(source, store.clone(), Arc::clone(&dispatcher)))
            .spawn(transport.clone(), config.poll_interval());

        let commands = AuthenticatedCommand::new(
            HttpCommandClient::new(http.clone(), base_url.clone()),
            HttpTokenRefresher::new(http, base_url.clone()).with_path(&config.relay.refresh_path),
            session,
        );

        let subscriptions = vec![
            fabric.subscribe(|change| {
                tracing::info!(
                    entity_id = %change.entity_id,
                    optimistic = change.optimistic,
                    origin = ?change.origin,
                    attributes = change.attributes.len(),
                    "entity changed"
                );
            }),
            fabric.subscribe_to_music(|update| {
                tracing::info!(
                    is_playing = update.is_playing,
                    track = update.track_info.as_ref().map_or("-", |track| track.name.as_str()),
                    track_changed = update.track_changed,
                    "music changed"
                );
            }),
        ];

        let auth_status = dispatcher.auth_status();
        let status_logger = tokio::spawn(log_relay_status(dispatcher.auth_status()));

        Self {
            coordinator: OptimisticCoordinator::new(store.clone()).with_grace(config.grace()),
            store,
            commands,
            base_url,
            transport,
            auth_status,
            transport_task,
            background: vec![follower, poller, status_logger],
            _subscriptions: subscriptions,
        }
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    #[must_use]
    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    /// Relay address; setting it redials the push connection.
    #[must_use]
    pub fn base_url(&self) -> &SharedBaseUrl {
        &self.base_url
    }

    #[must_use]
    pub fn auth_status(&self) -> watch::Receiver<AuthStatus> {
        self.auth_status.clone()
    }

    /// Apply `local` optimistically and send `request` to the relay.
    ///
    /// # Errors
    ///
    /// Returns the command or auth failure after the local change was
    /// rolled back.
    pub async fn send_command(
        &self,
        entity_id: &EntityId,
        local: Attributes,
        request: CommandRequest,
    ) -> Result<RemoteResponse, SyncError> {
        self.coordinator
            .mutate_with(&self.commands, entity_id, local, request)
            .await
    }

    /// Stop the transport and every background task.
    pub async fn shutdown(self) {
        self.transport.shutdown();
        for task in &self.background {
            task.abort();
        }
        if let Err(err) = self.transport_task.await {
            tracing::warn!(%err, "transport task ended abnormally");
        }
        tracing::info!("client engine stopped");
    }
}

async fn log_relay_status(mut status: watch::Receiver<AuthStatus>) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        tracing::info!(
            logged_in = current.logged_in,
            connected_to_middleware = current.connected_to_middleware,
            "relay status changed"
        );
    }
}
