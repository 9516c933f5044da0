//! Push frames — named events arriving over a push transport.
//!
//! This is the ingestion boundary: raw text is parsed and validated here
//! into typed frames, and nothing past this point deals with loose JSON.
//! Frames arrive either bare (the relay names the event and sends the body)
//! or wrapped in a [`BroadcastEnvelope`](crate::envelope::BroadcastEnvelope)
//! (the hub sends `{type, ...}` with no event name).

use serde_json::Value;

use crate::auth::AuthStatus;
use crate::entity::{Attributes, StateUpdate};
use crate::error::FrameError;
use crate::id::EntityId;
use crate::music::PlayerState;
use crate::time::{Timestamp, from_millis};

pub const STATUS: &str = "status";
pub const PLAYER_STATE: &str = "player_state";
pub const DEVICE_STATE: &str = "device_state";
pub const ERROR: &str = "error";

/// A frame as delivered by the transport, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Event name, when the transport carries one (SSE `event:`).
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    #[must_use]
    pub fn new(event: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            event: event.map(str::to_string),
            data: data.into(),
        }
    }
}

/// A parsed, validated push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PushFrame {
    /// Relay login / middleware status.
    Status(AuthStatus),
    /// Player state, or `None` for the explicit "nothing active" sentinel.
    PlayerState {
        state: Option<PlayerState>,
        timestamp: Option<Timestamp>,
    },
    /// Attribute delta for one device.
    DeviceState(StateUpdate),
    /// Transport-level error reported by the remote side.
    Error(String),
}

impl PushFrame {
    /// Parse a raw frame.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] describing why the frame is malformed.
    pub fn parse(raw: &RawFrame) -> Result<Self, FrameError> {
        let body = raw.data.trim();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str::<Value>(body).map_err(FrameError::Json)?
        };

        let envelope_kind = value.get("type").and_then(Value::as_str);
        let enveloped = envelope_kind.is_some();
        let kind = match raw.event.as_deref() {
            Some(name) if !name.is_empty() && name != "message" => name.to_string(),
            _ => envelope_kind.unwrap_or_default().to_string(),
        };

        match kind.as_str() {
            STATUS => {
                let body = if enveloped {
                    value.get("payload").cloned().unwrap_or(Value::Null)
                } else {
                    value
                };
                serde_json::from_value(body)
                    .map(Self::Status)
                    .map_err(FrameError::Json)
            }
            PLAYER_STATE | "playerState" => parse_player_state(&value, enveloped),
            DEVICE_STATE => parse_device_state(&value).map(Self::DeviceState),
            ERROR => Ok(Self::Error(
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(body)
                    .to_string(),
            )),
            other => Err(FrameError::UnknownKind(other.to_string())),
        }
    }
}

fn parse_player_state(value: &Value, enveloped: bool) -> Result<PushFrame, FrameError> {
    let timestamp = read_timestamp(value)?;
    let body = if enveloped {
        value.get("payload").unwrap_or(&Value::Null)
    } else {
        value
    };
    let is_sentinel = match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    let state = if is_sentinel {
        None
    } else {
        Some(serde_json::from_value::<PlayerState>(body.clone()).map_err(FrameError::Json)?)
    };
    Ok(PushFrame::PlayerState { state, timestamp })
}

fn parse_device_state(value: &Value) -> Result<StateUpdate, FrameError> {
    let id = value
        .get("deviceId")
        .or_else(|| value.get("entityId"))
        .ok_or(FrameError::MissingField("deviceId"))?;
    let id = match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(FrameError::MissingField("deviceId")),
    };
    let entity_id = EntityId::new(id).map_err(|_| FrameError::EmptyEntityId)?;

    let attributes = value
        .get("attributes")
        .and_then(Value::as_object)
        .ok_or(FrameError::MissingField("attributes"))?;
    let attributes = Attributes::from_json_object(attributes)?;

    let timestamp = read_timestamp(value)?.ok_or(FrameError::MissingField("timestamp"))?;

    Ok(StateUpdate::new(entity_id, attributes, timestamp))
}

fn read_timestamp(value: &Value) -> Result<Option<Timestamp>, FrameError> {
    match value.get("timestamp").and_then(Value::as_i64) {
        Some(millis) => from_millis(millis)
            .map(Some)
            .ok_or(FrameError::InvalidTimestamp(millis)),
        None => Ok(None),
    }
}
