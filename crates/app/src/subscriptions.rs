//! Subscription fabric — typed listeners with scoped, RAII-style handles.
//!
//! Listeners register on one of three scopes: every entity, one entity, or
//! the `"music"` pseudo-entity (which gets a richer [`MusicUpdate`]). Each
//! registration returns a [`Subscription`]; dropping it (or calling
//! [`Subscription::unsubscribe`]) removes exactly that registration.
//!
//! A panicking listener is caught and logged; the remaining listeners of the
//! same notification round still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use homesync_domain::entity::Attributes;
use homesync_domain::id::{EntityId, SubscriptionId};
use homesync_domain::music::{MusicState, MusicUpdate};

/// Why an entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// An accepted remote update (after debounce).
    Remote,
    /// A local optimistic mutation, before confirmation.
    Optimistic,
    /// The remote side accepted an optimistic mutation.
    Confirmed,
    /// An optimistic mutation was rejected and reverted.
    Rollback,
}

/// Payload delivered to entity listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChange {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    pub optimistic: bool,
    pub origin: ChangeOrigin,
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Registrations<T> = Vec<(SubscriptionId, Listener<T>)>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    Global,
    Entity(EntityId),
    Music,
}

#[derive(Default)]
struct Registry {
    global: Registrations<EntityChange>,
    entities: HashMap<EntityId, Registrations<EntityChange>>,
    music: Registrations<MusicUpdate>,
    last_music: Option<MusicState>,
}

impl Registry {
    fn remove(&mut self, scope: &Scope, id: SubscriptionId) {
        match scope {
            Scope::Global => self.global.retain(|(sid, _)| *sid != id),
            Scope::Entity(entity_id) => {
                if let Some(list) = self.entities.get_mut(entity_id) {
                    list.retain(|(sid, _)| *sid != id);
                    if list.is_empty() {
                        self.entities.remove(entity_id);
                    }
                }
            }
            Scope::Music => self.music.retain(|(sid, _)| *sid != id),
        }
    }
}

/// Registry of listeners, shared by the store and UI widgets.
#[derive(Clone, Default)]
pub struct SubscriptionFabric {
    registry: Arc<Mutex<Registry>>,
}

impl SubscriptionFabric {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to every accepted entity change.
    #[must_use]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&EntityChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.lock().global.push((id, Arc::new(listener)));
        self.handle(id, Scope::Global)
    }

    /// Listen to changes of a single entity.
    #[must_use]
    pub fn subscribe_to_entity<F>(&self, entity_id: EntityId, listener: F) -> Subscription
    where
        F: Fn(&EntityChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.lock()
            .entities
            .entry(entity_id.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        self.handle(id, Scope::Entity(entity_id))
    }

    /// Listen to playback changes of the `"music"` pseudo-entity.
    #[must_use]
    pub fn subscribe_to_music<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MusicUpdate) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.lock().music.push((id, Arc::new(listener)));
        self.handle(id, Scope::Music)
    }

    /// Number of live registrations across all scopes.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let registry = self.lock();
        registry.global.len()
            + registry.music.len()
            + registry.entities.values().map(Vec::len).sum::<usize>()
    }

    /// Deliver one change to every interested listener.
    ///
    /// Listeners are invoked outside the registry lock, so they may
    /// subscribe, unsubscribe or read the store.
    pub fn notify(&self, change: &EntityChange) {
        let (entity_listeners, music) = {
            let mut registry = self.lock();
            let mut listeners: Vec<Listener<EntityChange>> =
                registry.global.iter().map(|(_, l)| Arc::clone(l)).collect();
            if let Some(list) = registry.entities.get(&change.entity_id) {
                listeners.extend(list.iter().map(|(_, l)| Arc::clone(l)));
            }

            let music = if change.entity_id.is_music() {
                let current = MusicState::from_attributes(&change.attributes);
                let update = MusicUpdate::diff(registry.last_music.as_ref(), &current);
                registry.last_music = Some(current);
                let music_listeners: Vec<Listener<MusicUpdate>> =
                    registry.music.iter().map(|(_, l)| Arc::clone(l)).collect();
                Some((update, music_listeners))
            } else {
                None
            };
            (listeners, music)
        };

        for listener in entity_listeners {
            invoke(&change.entity_id, || listener(change));
        }
        if let Some((update, listeners)) = music {
            for listener in listeners {
                invoke(&change.entity_id, || listener(&update));
            }
        }
    }

    fn handle(&self, id: SubscriptionId, scope: Scope) -> Subscription {
        Subscription {
            id,
            scope,
            registry: Arc::downgrade(&self.registry),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn invoke(entity_id: &EntityId, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::warn!(entity_id = %entity_id, "listener panicked, continuing notification round");
    }
}

/// Handle to one listener registration.
///
/// Dropping the handle unsubscribes. Use [`Subscription::detach`] to keep
/// the listener for the lifetime of the fabric.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: SubscriptionId,
    scope: Scope,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.scope, self.id);
        }
        self.registry = Weak::new();
    }

    /// Keep the listener registered after this handle is gone.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
