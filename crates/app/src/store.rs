//! State store — the single owner of entity records.
//!
//! Remote updates go through [`StateStore::apply_remote_update`], which
//! enforces timestamp ordering, honours interaction locks and debounces
//! listener notifications. Optimistic mutations go through the
//! [`OptimisticCoordinator`](crate::coordinator::OptimisticCoordinator),
//! which uses the crate-private half of the API below.
//!
//! Timers (debounce, lock expiry) are Tokio tasks, so the store must be used
//! from within a Tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use homesync_domain::entity::{Attributes, EntityRecord, StateUpdate};
use homesync_domain::id::{CommandId, EntityId};
use homesync_domain::time::{Timestamp, now};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::subscriptions::{ChangeOrigin, EntityChange, SubscriptionFabric};

/// Timing knobs of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Trailing-edge debounce before notifying a remote change.
    pub debounce: Duration,
    /// Age after which an entity is considered stale.
    pub stale_after: Duration,
    /// Default interaction lock window.
    pub lock_window: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            stale_after: Duration::from_secs(15),
            lock_window: Duration::from_secs(2),
        }
    }
}

/// What [`StateStore::apply_remote_update`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Merged into the record. `significant` tells whether a notification
    /// was scheduled.
    Applied { significant: bool },
    /// Dropped: not newer than the last accepted timestamp.
    Stale,
    /// Held back by an interaction lock, replayed on unlock.
    Queued,
}

/// A local mutation awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub id: CommandId,
    pub entity_id: EntityId,
    pub command: String,
    pub value: Attributes,
    pub issued_at: Timestamp,
    /// Attributes immediately before the first unresolved optimistic write.
    pub rollback_snapshot: Attributes,
}

struct Slot {
    record: EntityRecord,
    accepted_at: Option<Instant>,
}

impl Slot {
    fn new(id: EntityId) -> Self {
        Self {
            record: EntityRecord::empty(id),
            accepted_at: None,
        }
    }
}

struct Lock {
    generation: u64,
    expiry: AbortHandle,
    queued: Option<StateUpdate>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<EntityId, Slot>,
    debounces: HashMap<EntityId, (u64, AbortHandle)>,
    locks: HashMap<EntityId, Lock>,
    pending: HashMap<EntityId, PendingCommand>,
    next_token: u64,
}

impl Inner {
    fn token(&mut self) -> u64 {
        self.next_token = self.next_token.wrapping_add(1);
        self.next_token
    }

    fn slot(&mut self, id: &EntityId) -> &mut Slot {
        self.records
            .entry(id.clone())
            .or_insert_with(|| Slot::new(id.clone()))
    }

    fn release_lock(&mut self, id: &EntityId) -> Option<StateUpdate> {
        self.locks.remove(id).and_then(|lock| {
            lock.expiry.abort();
            lock.queued
        })
    }

    fn change(&self, id: &EntityId, origin: ChangeOrigin) -> Option<EntityChange> {
        self.records.get(id).map(|slot| EntityChange {
            entity_id: id.clone(),
            attributes: slot.record.attributes.clone(),
            optimistic: slot.record.optimistic,
            origin,
        })
    }
}

struct Shared {
    config: StoreConfig,
    inner: Mutex<Inner>,
    fabric: SubscriptionFabric,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, (_, handle)) in inner.debounces.drain() {
            handle.abort();
        }
        for (_, lock) in inner.locks.drain() {
            lock.expiry.abort();
        }
    }
}

/// Local cache of entity state. Cheap to clone; clones share the records.
#[derive(Clone)]
pub struct StateStore {
    shared: Arc<Shared>,
}

impl StateStore {
    #[must_use]
    pub fn new(config: StoreConfig, fabric: SubscriptionFabric) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner::default()),
                fabric,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.shared.config
    }

    /// The fabric this store notifies.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionFabric {
        &self.shared.fabric
    }

    /// Apply an update received from a push source.
    pub fn apply_remote_update(&self, update: StateUpdate) -> ApplyOutcome {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;

        if let Some(lock) = inner.locks.get_mut(&update.entity_id) {
            let newer = lock
                .queued
                .as_ref()
                .is_none_or(|queued| update.timestamp >= queued.timestamp);
            if newer {
                tracing::debug!(entity_id = %update.entity_id, "entity locked, queueing update");
                lock.queued = Some(update);
            }
            return ApplyOutcome::Queued;
        }

        let slot = inner.slot(&update.entity_id);
        if !slot.record.accepts(update.timestamp) {
            tracing::debug!(
                entity_id = %update.entity_id,
                timestamp = %update.timestamp,
                "dropping stale update"
            );
            return ApplyOutcome::Stale;
        }
        let significant = slot.record.attributes.merge(&update.attributes);
        slot.record.last_updated = Some(update.timestamp);
        slot.accepted_at = Some(Instant::now());

        if significant {
            self.schedule_notification(inner, update.entity_id);
        }
        ApplyOutcome::Applied { significant }
    }

    /// Apply a batch of updates fetched by a full refresh.
    ///
    /// Each update goes through [`Self::apply_remote_update`], so locks and
    /// timestamp ordering still hold. Returns how many were merged.
    pub fn import_snapshot(&self, updates: impl IntoIterator<Item = StateUpdate>) -> usize {
        updates
            .into_iter()
            .map(|update| self.apply_remote_update(update))
            .filter(|outcome| matches!(outcome, ApplyOutcome::Applied { .. }))
            .count()
    }

    /// Current attributes of an entity; empty when unknown.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Attributes {
        self.shared
            .lock()
            .records
            .get(id)
            .map(|slot| slot.record.attributes.clone())
            .unwrap_or_default()
    }

    /// A copy of the full record, if the entity is known.
    #[must_use]
    pub fn record(&self, id: &EntityId) -> Option<EntityRecord> {
        self.shared
            .lock()
            .records
            .get(id)
            .map(|slot| slot.record.clone())
    }

    /// Whether no remote update was accepted within the default window.
    #[must_use]
    pub fn is_stale(&self, id: &EntityId) -> bool {
        self.is_stale_after(id, self.shared.config.stale_after)
    }

    /// Whether no remote update was accepted within `max_age`.
    #[must_use]
    pub fn is_stale_after(&self, id: &EntityId, max_age: Duration) -> bool {
        self.shared
            .lock()
            .records
            .get(id)
            .and_then(|slot| slot.accepted_at)
            .is_none_or(|at| at.elapsed() > max_age)
    }

    /// Lock an entity for the default window.
    pub fn lock(&self, id: &EntityId) {
        self.lock_for(id, self.shared.config.lock_window);
    }

    /// Lock an entity for `window`, or re-arm an existing lock.
    pub fn lock_for(&self, id: &EntityId, window: Duration) {
        let mut inner = self.shared.lock();
        self.arm_lock(&mut inner, id, window);
    }

    /// Release a lock and replay the most recent update it held back.
    pub fn unlock(&self, id: &EntityId) {
        let queued = self.shared.lock().release_lock(id);
        self.replay(queued);
    }

    #[must_use]
    pub fn is_locked(&self, id: &EntityId) -> bool {
        self.shared.lock().locks.contains_key(id)
    }

    /// The unresolved optimistic command of an entity.
    #[must_use]
    pub fn pending_command(&self, id: &EntityId) -> Option<PendingCommand> {
        self.shared.lock().pending.get(id).cloned()
    }

    /// Apply `local` optimistically, lock the entity and notify at once.
    ///
    /// A second write while one is pending takes over the pending record,
    /// keeps its rollback snapshot and extends the lock.
    pub(crate) fn begin_optimistic(
        &self,
        id: &EntityId,
        local: &Attributes,
        command: String,
    ) -> CommandId {
        let command_id = CommandId::new();
        let change = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;

            let current = inner.slot(id).record.attributes.clone();
            let rollback_snapshot = match inner.pending.remove(id) {
                Some(previous) => {
                    tracing::debug!(
                        entity_id = %id,
                        superseded = %previous.id,
                        "optimistic write supersedes pending command"
                    );
                    previous.rollback_snapshot
                }
                None => current,
            };

            let slot = inner.slot(id);
            slot.record.attributes.merge(local);
            slot.record.optimistic = true;

            inner.pending.insert(
                id.clone(),
                PendingCommand {
                    id: command_id,
                    entity_id: id.clone(),
                    command,
                    value: local.clone(),
                    issued_at: now(),
                    rollback_snapshot,
                },
            );
            if let Some((_, handle)) = inner.debounces.remove(id) {
                handle.abort();
            }
            self.arm_lock(inner, id, self.shared.config.lock_window);
            inner.change(id, ChangeOrigin::Optimistic)
        };
        if let Some(change) = change {
            self.shared.fabric.notify(&change);
        }
        command_id
    }

    /// Settle a successful command.
    ///
    /// The current command clears the optimistic flag, notifies listeners
    /// with [`ChangeOrigin::Confirmed`] and keeps the lock for `grace` to
    /// absorb the server's echo. A superseded command folds
    /// its attributes into the rollback snapshot of the current one.
    pub(crate) fn confirm_optimistic(
        &self,
        id: &EntityId,
        command_id: CommandId,
        local: &Attributes,
        grace: Duration,
    ) {
        let change = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            match inner.pending.get(id).map(|pending| pending.id) {
                Some(current) if current == command_id => {
                    inner.pending.remove(id);
                    if let Some(slot) = inner.records.get_mut(id) {
                        slot.record.optimistic = false;
                    }
                    self.arm_lock(inner, id, grace);
                    inner.change(id, ChangeOrigin::Confirmed)
                }
                Some(_) => {
                    if let Some(pending) = inner.pending.get_mut(id) {
                        pending.rollback_snapshot.merge(local);
                    }
                    None
                }
                None => None,
            }
        };
        if let Some(change) = change {
            self.shared.fabric.notify(&change);
        }
    }

    /// Revert a failed command to its rollback snapshot.
    ///
    /// Returns `false` (and does nothing) when the command was superseded.
    pub(crate) fn rollback_optimistic(&self, id: &EntityId, command_id: CommandId) -> bool {
        let (change, queued) = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            let Some(pending) = inner.pending.remove(id) else {
                return false;
            };
            if pending.id != command_id {
                inner.pending.insert(id.clone(), pending);
                return false;
            }
            let slot = inner.slot(id);
            slot.record.attributes = pending.rollback_snapshot;
            slot.record.optimistic = false;
            let queued = inner.release_lock(id);
            (inner.change(id, ChangeOrigin::Rollback), queued)
        };
        if let Some(change) = change {
            self.shared.fabric.notify(&change);
        }
        self.replay(queued);
        true
    }

    fn schedule_notification(&self, inner: &mut Inner, id: EntityId) {
        let token = inner.token();
        let handle = self.spawn_timer(self.shared.config.debounce, {
            let id = id.clone();
            move |store| store.flush_notification(&id, token)
        });
        if let Some((_, previous)) = inner.debounces.insert(id, (token, handle)) {
            previous.abort();
        }
    }

    fn flush_notification(&self, id: &EntityId, token: u64) {
        let change = {
            let mut inner = self.shared.lock();
            match inner.debounces.get(id) {
                Some((current, _)) if *current == token => {}
                _ => return,
            }
            inner.debounces.remove(id);
            inner.change(id, ChangeOrigin::Remote)
        };
        if let Some(change) = change {
            self.shared.fabric.notify(&change);
        }
    }

    fn arm_lock(&self, inner: &mut Inner, id: &EntityId, window: Duration) {
        let generation = inner.token();
        let expiry = self.spawn_timer(window, {
            let id = id.clone();
            move |store| store.expire_lock(&id, generation)
        });
        if let Some(lock) = inner.locks.get_mut(id) {
            lock.expiry.abort();
            lock.expiry = expiry;
            lock.generation = generation;
        } else {
            inner.locks.insert(
                id.clone(),
                Lock {
                    generation,
                    expiry,
                    queued: None,
                },
            );
        }
    }

    fn expire_lock(&self, id: &EntityId, generation: u64) {
        let queued = {
            let mut inner = self.shared.lock();
            match inner.locks.get(id) {
                Some(lock) if lock.generation == generation => {}
                _ => return,
            }
            tracing::debug!(entity_id = %id, "interaction lock expired");
            inner.release_lock(id)
        };
        self.replay(queued);
    }

    fn replay(&self, queued: Option<StateUpdate>) {
        if let Some(update) = queued {
            tracing::debug!(entity_id = %update.entity_id, "replaying update held by lock");
            self.apply_remote_update(update);
        }
    }

    fn spawn_timer<F>(&self, delay: Duration, fire: F) -> AbortHandle
    where
        F: FnOnce(&StateStore) + Send + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                fire(&StateStore { shared });
            }
        })
        .abort_handle()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
