//! Refresh-token exchange.

use std::future::Future;

use homesync_app::base_url::join;
use homesync_app::ports::{BaseUrlProvider, TokenRefresher};
use homesync_domain::auth::AuthTokens;
use homesync_domain::error::SyncError;
use homesync_domain::time::now;
use serde::{Deserialize, Serialize};

use crate::error::{ReqwestError, check_status};

pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

/// [`TokenRefresher`] posting `{refreshToken}` and reading
/// `{accessToken, refreshToken?, expiresIn?}`.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher<B> {
    http: reqwest::Client,
    base_url: B,
    path: String,
}

impl<B: BaseUrlProvider> HttpTokenRefresher<B> {
    pub fn new(http: reqwest::Client, base_url: B) -> Self {
        Self {
            http,
            base_url,
            path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl<B: BaseUrlProvider> TokenRefresher for HttpTokenRefresher<B> {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<AuthTokens, SyncError>> + Send {
        let request = self
            .http
            .post(join(&self.base_url.base_url(), &self.path))
            .json(&RefreshRequest { refresh_token });
        async move {
            let response = check_status(request.send().await.map_err(ReqwestError::from)?)?;
            let body: RefreshResponse = response.json().await.map_err(ReqwestError::from)?;
            let expires_at = body
                .expires_in
                .and_then(chrono::TimeDelta::try_seconds)
                .and_then(|lifetime| now().checked_add_signed(lifetime));
            Ok(AuthTokens {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
                expires_at,
            })
        }
    }
}
