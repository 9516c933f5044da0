//! Entity — the central state-holding concept of the dashboard.
//!
//! An entity is any controllable device or logical channel, including the
//! reserved `"music"` playback pseudo-entity. The store is attribute-agnostic:
//! which keys an entity carries depends on its kind.

mod attribute_key;
mod attribute_value;
mod attributes;

use serde::{Deserialize, Serialize};

pub use attribute_key::AttributeKey;
pub use attribute_value::AttributeValue;
pub use attributes::{Attributes, NUMERIC_TOLERANCE};

use crate::id::EntityId;
use crate::time::Timestamp;

/// Last-known state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub attributes: Attributes,
    /// Timestamp carried by the last accepted remote update.
    ///
    /// `None` until the first remote update is accepted. Optimistic
    /// mutations never move it, so the server's own echo still passes
    /// deduplication.
    pub last_updated: Option<Timestamp>,
    /// A local mutation is awaiting remote confirmation.
    pub optimistic: bool,
}

impl EntityRecord {
    /// An entity nobody has heard about yet.
    #[must_use]
    pub fn empty(id: EntityId) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
            last_updated: None,
            optimistic: false,
        }
    }

    /// Whether an update carrying `timestamp` is newer than what we hold.
    #[must_use]
    pub fn accepts(&self, timestamp: Timestamp) -> bool {
        self.last_updated.is_none_or(|last| timestamp > last)
    }
}

/// A normalized remote update: `(entity id, attributes, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    pub timestamp: Timestamp,
}

impl StateUpdate {
    #[must_use]
    pub fn new(entity_id: EntityId, attributes: Attributes, timestamp: Timestamp) -> Self {
        Self {
            entity_id,
            attributes,
            timestamp,
        }
    }
}
