//! Token refresh port.

use std::future::Future;

use homesync_domain::auth::AuthTokens;
use homesync_domain::error::SyncError;

/// Exchanges a refresh token for fresh token material.
pub trait TokenRefresher: Send + Sync {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<AuthTokens, SyncError>> + Send;
}
