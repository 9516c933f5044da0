//! Polling fallback — pulls full snapshots while no push connection is live.

use std::sync::Arc;
use std::time::Duration;

use homesync_domain::error::SyncError;
use homesync_domain::id::EntityId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::dispatcher::FrameDispatcher;
use crate::ports::SnapshotSource;
use crate::store::StateStore;
use crate::transport::TransportHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct PollingFallback<S> {
    source: S,
    store: StateStore,
    dispatcher: Arc<FrameDispatcher>,
}

impl<S: SnapshotSource> PollingFallback<S> {
    pub fn new(source: S, store: StateStore, dispatcher: Arc<FrameDispatcher>) -> Self {
        Self {
            source,
            store,
            dispatcher,
        }
    }

    /// Fetch devices and player once and import them.
    ///
    /// A `204` from the player endpoint goes through the stale-null guard
    /// like an empty push. Returns how many device updates were merged.
    ///
    /// # Errors
    ///
    /// Returns the [`SnapshotSource`] error; nothing is imported for the
    /// failing half.
    pub async fn poll_once(&self) -> Result<usize, SyncError> {
        let devices = self.source.fetch_devices().await?;
        let imported = self.store.import_snapshot(devices);
        let player = self.source.fetch_player().await?;
        self.dispatcher.apply_player_state(player, None);
        tracing::debug!(imported, "snapshot imported");
        Ok(imported)
    }

    /// Poll only if `id` has not been updated recently.
    ///
    /// Returns whether a poll happened.
    ///
    /// # Errors
    ///
    /// See [`Self::poll_once`].
    pub async fn refresh_if_stale(&self, id: &EntityId) -> Result<bool, SyncError> {
        if !self.store.is_stale(id) {
            return Ok(false);
        }
        self.poll_once().await?;
        Ok(true)
    }

    /// Poll every `interval` while the transport is not connected.
    pub fn spawn(self: Arc<Self>, transport: TransportHandle, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if transport.is_connected() {
                    continue;
                }
                if let Err(err) = self.poll_once().await {
                    tracing::warn!(error = %err, "snapshot poll failed, retrying next tick");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use homesync_domain::entity::{AttributeKey, StateUpdate};
    use homesync_domain::error::{CommandError, TransportError};
    use homesync_domain::music::PlayerState;

    use crate::backoff::BackoffConfig;
    use crate::dispatcher::PlayerOutcome;
    use crate::ports::{FrameSink, FrameStream, PushConnector};
    use crate::stale_null::StaleNullGuard;
    use crate::store::StoreConfig;
    use crate::store::tests::{id, switch, update};
    use crate::subscriptions::SubscriptionFabric;
    use crate::transport::TransportController;
    use homesync_domain::frame::RawFrame;

    struct Source {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl Source {
        fn new(fail: bool) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl SnapshotSource for Source {
        fn fetch_devices(
            &self,
        ) -> impl Future<Output = Result<Vec<StateUpdate>, SyncError>> + Send {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(SyncError::from(CommandError::Status { status: 503 }))
            } else {
                let millis = 1_000 + i64::try_from(n).unwrap_or_default();
                Ok(vec![update("457", switch("on"), millis)])
            };
            async move { result }
        }

        fn fetch_player(
            &self,
        ) -> impl Future<Output = Result<Option<PlayerState>, SyncError>> + Send {
            async { Ok(None) }
        }
    }

    /// Connects to a stream that never yields.
    struct Idle;

    impl PushConnector for Idle {
        fn connect(
            &self,
            _url: &str,
        ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send {
            async { Ok(Box::pin(tokio_stream::pending()) as FrameStream) }
        }
    }

    struct NoopSink;

    impl FrameSink for NoopSink {
        fn handle(&self, _frame: RawFrame) {}
    }

    fn fallback(source: Source) -> Arc<PollingFallback<Source>> {
        let store = StateStore::new(StoreConfig::default(), SubscriptionFabric::new());
        let dispatcher = Arc::new(FrameDispatcher::new(
            store.clone(),
            StaleNullGuard::default(),
        ));
        Arc::new(PollingFallback::new(source, store, dispatcher))
    }

    #[tokio::test(start_paused = true)]
    async fn should_import_devices_on_poll() {
        let fallback = fallback(Source::new(false));

        let imported = fallback.poll_once().await.unwrap();

        assert_eq!(imported, 1);
        assert_eq!(
            fallback.store.get(&id("457")).get(&AttributeKey::Switch),
            Some(&"on".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_route_no_content_player_through_stale_null_guard() {
        let fallback = fallback(Source::new(false));
        fallback
            .dispatcher
            .apply_player_state(Some(PlayerState { is_playing: true, ..PlayerState::default() }), None);

        fallback.poll_once().await.unwrap();

        assert_eq!(
            fallback.dispatcher.apply_player_state(None, None),
            PlayerOutcome::Suppressed
        );
        assert_eq!(
            fallback
                .store
                .get(&EntityId::music())
                .get(&AttributeKey::IsPlaying),
            Some(&true.into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_refresh_only_when_stale() {
        let fallback = fallback(Source::new(false));

        assert!(fallback.refresh_if_stale(&id("457")).await.unwrap());
        assert!(!fallback.refresh_if_stale(&id("457")).await.unwrap());

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(fallback.refresh_if_stale(&id("457")).await.unwrap());
        assert_eq!(fallback.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_poll_periodically_while_disconnected() {
        let fallback = fallback(Source::new(true));
        let (transport, _task) =
            TransportController::spawn(Idle, NoopSink, BackoffConfig::default());

        let poller = Arc::clone(&fallback).spawn(transport, DEFAULT_POLL_INTERVAL);
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        poller.abort();

        assert_eq!(fallback.source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_poll_while_connected() {
        let fallback = fallback(Source::new(false));
        let (transport, _task) =
            TransportController::spawn(Idle, NoopSink, BackoffConfig::default());
        transport.connect("http://relay/events");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transport.is_connected());

        let poller = Arc::clone(&fallback).spawn(transport, DEFAULT_POLL_INTERVAL);
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        poller.abort();

        assert_eq!(fallback.source.fetches.load(Ordering::SeqCst), 0);
    }
}
