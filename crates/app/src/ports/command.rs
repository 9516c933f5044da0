//! Remote command port — the API client the core calls and awaits.

use std::future::Future;

use homesync_domain::error::{CommandError, SyncError};

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A request for the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Bearer token attached by the auth layer.
    pub bearer: Option<String>,
}

impl CommandRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// Response to a [`CommandRequest`].
///
/// `204 No Content` is a success with no body, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl RemoteResponse {
    #[must_use]
    pub fn new(status: u16, body: Option<serde_json::Value>) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    /// Turn non-success statuses into a [`CommandError`].
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Unauthorized`] for `401` and
    /// [`CommandError::Status`] for any other non-2xx status.
    pub fn error_for_status(self) -> Result<Self, CommandError> {
        match self.status {
            _ if self.is_success() => Ok(self),
            401 => Err(CommandError::Unauthorized),
            status => Err(CommandError::Status { status }),
        }
    }
}

/// Executes remote commands.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and `Err` only when no response was obtained.
pub trait RemoteCommand: Send + Sync {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> impl Future<Output = Result<RemoteResponse, SyncError>> + Send;
}

impl<T: RemoteCommand> RemoteCommand for std::sync::Arc<T> {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> impl Future<Output = Result<RemoteResponse, SyncError>> + Send {
        (**self).execute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_treat_no_content_as_success() {
        let response = RemoteResponse::no_content();
        assert!(response.is_no_content());
        assert!(response.error_for_status().is_ok());
    }

    #[test]
    fn should_map_unauthorized_status() {
        let response = RemoteResponse::new(401, None);
        assert!(matches!(
            response.error_for_status(),
            Err(CommandError::Unauthorized)
        ));
    }

    #[test]
    fn should_map_server_error_status() {
        let response = RemoteResponse::new(502, None);
        assert!(matches!(
            response.error_for_status(),
            Err(CommandError::Status { status: 502 })
        ));
    }
}
