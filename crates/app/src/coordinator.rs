//! Optimistic update coordinator.
//!
//! Applies a gesture locally before the remote side confirms it, then
//! settles: success clears the optimistic flag and keeps the entity locked
//! for a grace period, failure restores the snapshot and hands the error
//! back to the caller.

use std::future::Future;
use std::time::Duration;

use homesync_domain::entity::Attributes;
use homesync_domain::error::SyncError;
use homesync_domain::id::EntityId;

use crate::ports::{CommandRequest, RemoteCommand, RemoteResponse};
use crate::store::StateStore;

/// Lock kept after a successful command, absorbing the server's echo.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(500);

/// Runs remote commands against the [`StateStore`] with optimistic apply
/// and rollback.
#[derive(Debug, Clone)]
pub struct OptimisticCoordinator {
    store: StateStore,
    grace: Duration,
}

impl OptimisticCoordinator {
    #[must_use]
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            grace: DEFAULT_GRACE,
        }
    }

    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Apply `local` to `entity_id` now and settle it with `remote`.
    ///
    /// The in-flight call is never aborted; a failure is handled after the
    /// fact by rolling back.
    ///
    /// # Errors
    ///
    /// Returns the error of `remote`, or a [`CommandError`] for a
    /// non-success status. The entity is rolled back in both cases.
    ///
    /// [`CommandError`]: homesync_domain::error::CommandError
    pub async fn mutate<F>(
        &self,
        entity_id: &EntityId,
        local: Attributes,
        remote: F,
    ) -> Result<RemoteResponse, SyncError>
    where
        F: Future<Output = Result<RemoteResponse, SyncError>>,
    {
        self.settle(entity_id, local, "command".to_string(), remote)
            .await
    }

    /// Like [`Self::mutate`], executing `request` through `api`.
    ///
    /// # Errors
    ///
    /// See [`Self::mutate`].
    pub async fn mutate_with<C>(
        &self,
        api: &C,
        entity_id: &EntityId,
        local: Attributes,
        request: CommandRequest,
    ) -> Result<RemoteResponse, SyncError>
    where
        C: RemoteCommand,
    {
        let label = format!("{:?} {}", request.method, request.path);
        self.settle(entity_id, local, label, api.execute(request))
            .await
    }

    async fn settle<F>(
        &self,
        entity_id: &EntityId,
        local: Attributes,
        command: String,
        remote: F,
    ) -> Result<RemoteResponse, SyncError>
    where
        F: Future<Output = Result<RemoteResponse, SyncError>>,
    {
        let command_id = self.store.begin_optimistic(entity_id, &local, command);

        let result = remote
            .await
            .and_then(|response| response.error_for_status().map_err(SyncError::from));

        match result {
            Ok(response) => {
                tracing::debug!(entity_id = %entity_id, status = response.status, "command confirmed");
                self.store
                    .confirm_optimistic(entity_id, command_id, &local, self.grace);
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(entity_id = %entity_id, error = %err, "command failed, rolling back");
                self.store.rollback_optimistic(entity_id, command_id);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesync_domain::entity::AttributeKey;
    use homesync_domain::error::CommandError;
    use tokio::sync::oneshot;

    use crate::store::tests::{id, record_changes, switch, update};
    use crate::store::{ApplyOutcome, StoreConfig};
    use crate::subscriptions::{ChangeOrigin, SubscriptionFabric};

    fn coordinator() -> OptimisticCoordinator {
        OptimisticCoordinator::new(StateStore::new(
            StoreConfig::default(),
            SubscriptionFabric::new(),
        ))
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_roll_back_and_propagate_when_command_fails() {
        let coordinator = coordinator();
        let store = coordinator.store().clone();
        store.apply_remote_update(update("E", switch("off"), 1_000));
        settle(150).await;
        let (changes, _sub) = record_changes(&store);

        let result = coordinator
            .mutate(&id("E"), switch("on"), async {
                Err(SyncError::from(CommandError::Network("connection reset".into())))
            })
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Command(CommandError::Network(_)))
        ));
        assert_eq!(store.get(&id("E")), switch("off"));
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].attributes, switch("on"));
        assert_eq!(changes[0].origin, ChangeOrigin::Optimistic);
        assert_eq!(changes[1].attributes, switch("off"));
        assert_eq!(changes[1].origin, ChangeOrigin::Rollback);
        assert!(!store.is_locked(&id("E")));
    }

    #[tokio::test(start_paused = true)]
    async fn should_roll_back_on_error_status() {
        let coordinator = coordinator();
        let store = coordinator.store().clone();
        store.apply_remote_update(update("E", switch("off"), 1_000));

        let result = coordinator
            .mutate(&id("E"), switch("on"), async {
                Ok(RemoteResponse::new(500, None))
            })
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Command(CommandError::Status { status: 500 }))
        ));
        assert_eq!(store.get(&id("E")), switch("off"));
        assert!(!store.record(&id("E")).unwrap().optimistic);
    }

    #[tokio::test(start_paused = true)]
    async fn should_treat_no_content_as_confirmation() {
        let coordinator = coordinator();
        let store = coordinator.store().clone();

        let response = coordinator
            .mutate(&id("E"), switch("on"), async {
                Ok(RemoteResponse::no_content())
            })
            .await
            .unwrap();

        assert!(response.is_no_content());
        assert_eq!(store.get(&id("E")), switch("on"));
        assert!(!store.record(&id("E")).unwrap().optimistic);
        assert!(store.pending_command(&id("E")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_replay_server_value_after_grace_period() {
        let coordinator = coordinator();
        let store = coordinator.store().clone();
        store.apply_remote_update(update("457", switch("off"), 1_000));
        settle(150).await;

        let (tx, rx) = oneshot::channel::<RemoteResponse>();
        let task = tokio::spawn({
            let coordinator = coordinator.clone();
            async move {
                coordinator
                    .mutate(&id("457"), switch("on"), async move {
                        rx.await.map_err(|_| {
                            SyncError::from(CommandError::Network("request dropped".into()))
                        })
                    })
                    .await
            }
        });
        settle(10).await;
        assert_eq!(store.get(&id("457")), switch("on"));

        let outcome = store.apply_remote_update(update("457", switch("off"), 2_000));
        assert_eq!(outcome, ApplyOutcome::Queued);
        assert_eq!(store.get(&id("457")), switch("on"));

        tx.send(RemoteResponse::new(200, None)).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(store.get(&id("457")), switch("on"));
        assert!(store.is_locked(&id("457")));

        settle(600).await;
        assert!(!store.is_locked(&id("457")));
        assert_eq!(
            store.get(&id("457")).get(&AttributeKey::Switch),
            Some(&"off".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_notify_confirmation_when_echo_is_insignificant() {
        let coordinator = coordinator();
        let store = coordinator.store().clone();
        store.apply_remote_update(update("457", switch("off"), 1_000));
        settle(150).await;
        let (changes, _sub) = record_changes(&store);

        coordinator
            .mutate(&id("457"), switch("on"), async {
                Ok(RemoteResponse::new(200, None))
            })
            .await
            .unwrap();
        store.apply_remote_update(update("457", switch("on"), 2_000));
        settle(5_000).await;

        assert!(!store.record(&id("457")).unwrap().optimistic);
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].origin, ChangeOrigin::Optimistic);
        assert!(changes[0].optimistic);
        let last = changes.last().unwrap();
        assert_eq!(last.origin, ChangeOrigin::Confirmed);
        assert!(!last.optimistic);
        assert_eq!(last.attributes, switch("on"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_execute_request_through_remote_command() {
        struct Accepting;

        impl RemoteCommand for Accepting {
            fn execute(
                &self,
                request: CommandRequest,
            ) -> impl Future<Output = Result<RemoteResponse, SyncError>> + Send {
                assert_eq!(request.path, "/api/devices/E/command");
                async { Ok(RemoteResponse::no_content()) }
            }
        }

        let coordinator = coordinator();
        let request = CommandRequest::new(crate::ports::Method::Post, "/api/devices/E/command")
            .with_body(serde_json::json!({"switch": "on"}));

        coordinator
            .mutate_with(&Accepting, &id("E"), switch("on"), request)
            .await
            .unwrap();

        assert_eq!(coordinator.store().get(&id("E")), switch("on"));
    }
}
