//! Authentication material and status.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Connection status reported by the relay in `status` frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthStatus {
    pub logged_in: bool,
    pub connected_to_middleware: bool,
}

/// Token material persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}

impl AuthTokens {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
