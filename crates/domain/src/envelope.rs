//! Broadcast envelope — the record the hub fans out to push clients.
//!
//! The hub never interprets envelopes beyond checking they have a type;
//! unknown fields are kept and republished verbatim.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::{Timestamp, to_millis};

/// A JSON event envelope: `{type, payload | deviceId | attributes, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BroadcastEnvelope {
    /// Envelope of the given type with no body.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            device_id: None,
            attributes: None,
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A `device_state` envelope for one device.
    #[must_use]
    pub fn device_state(
        device_id: impl Into<String>,
        attributes: serde_json::Map<String, serde_json::Value>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            attributes: Some(attributes),
            timestamp: Some(to_millis(timestamp)),
            ..Self::new(crate::frame::DEVICE_STATE)
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Fill in the timestamp if the sender left it out.
    pub fn stamp(&mut self, now: Timestamp) {
        if self.timestamp.is_none() {
            self.timestamp = Some(to_millis(now));
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyEventType`] when `type` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.kind.trim().is_empty() {
            return Err(ValidationError::EmptyEventType);
        }
        Ok(())
    }
}
