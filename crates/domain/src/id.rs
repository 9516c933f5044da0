//! Typed identifiers.
//!
//! Entity ids come from the remote side and are arbitrary non-empty strings.
//! Ids minted locally (subscriptions, pending commands, hub clients) are UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Reserved id of the media-playback pseudo-entity.
pub const MUSIC_ENTITY: &str = "music";

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identifies one listener registration in the subscription fabric.
    SubscriptionId
);

define_id!(
    /// Identifies one optimistic command in flight.
    CommandId
);

define_id!(
    /// Identifies one connected broadcast client.
    ClientId
);

/// Stable identifier of a controllable thing or logical channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Validate and wrap a raw id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyEntityId`] when `raw` is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::EmptyEntityId);
        }
        Ok(Self(raw))
    }

    /// The reserved media-playback pseudo-entity.
    #[must_use]
    pub fn music() -> Self {
        Self(MUSIC_ENTITY.to_string())
    }

    /// Whether this is the media-playback pseudo-entity.
    #[must_use]
    pub fn is_music(&self) -> bool {
        self.0 == MUSIC_ENTITY
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
