//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`SyncError`]
//! via `#[from]`. Only the optimistic update path surfaces a [`SyncError`]
//! to its caller; every other component logs and carries on.

/// Boxed error used where an adapter-specific source must cross a port.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by operations that report failure to the UI.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Input rejected at the ingestion boundary.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The remote command behind an optimistic update failed.
    #[error("remote command failed")]
    Command(#[from] CommandError),

    /// The push transport failed.
    #[error("transport error")]
    Transport(#[from] TransportError),

    /// No valid credentials are available; re-login is required.
    #[error("not authenticated")]
    Unauthenticated,

    /// The key-value persistence collaborator failed.
    #[error("storage error")]
    Storage(#[source] BoxError),
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// An entity id was empty or whitespace.
    #[error("entity id must not be empty")]
    EmptyEntityId,

    /// A broadcast envelope had no `type`.
    #[error("event type must not be empty")]
    EmptyEventType,

    /// A push frame could not be parsed.
    #[error("malformed frame")]
    Frame(#[from] FrameError),
}

/// Reasons a push frame is rejected.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame body is not valid JSON.
    #[error("frame body is not valid JSON")]
    Json(#[source] serde_json::Error),

    /// The frame kind is not one we dispatch.
    #[error("unknown frame kind {0:?}")]
    UnknownKind(String),

    /// A required field is absent.
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    /// An attribute value is an array or object.
    #[error("attribute {0:?} is not a scalar")]
    NonScalarAttribute(String),

    /// The carried timestamp cannot be represented.
    #[error("timestamp {0} out of range")]
    InvalidTimestamp(i64),

    /// The entity id is empty.
    #[error("entity id must not be empty")]
    EmptyEntityId,
}

/// Failures of a remote command issued through the API client.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The request never produced a response.
    #[error("network error")]
    Network(#[source] BoxError),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16 },

    /// The server answered `401`.
    #[error("unauthorized")]
    Unauthorized,

    /// The response body could not be decoded.
    #[error("failed to decode response body")]
    Decode(#[source] BoxError),
}

/// Failures of the push transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to open push connection")]
    Connect(#[source] BoxError),

    /// The endpoint answered with a non-success status.
    #[error("push endpoint answered {status}")]
    Status { status: u16 },

    /// An established connection dropped.
    #[error("push connection dropped")]
    Stream(#[source] BoxError),
}

impl From<FrameError> for SyncError {
    fn from(err: FrameError) -> Self {
        Self::Validation(ValidationError::Frame(err))
    }
}
