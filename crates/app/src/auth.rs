//! Auth session — persisted token material and 401 handling.
//!
//! [`AuthSession`] keeps tokens in a [`KeyValueStore`] under the `auth.*`
//! keys. [`AuthenticatedCommand`] wraps a [`RemoteCommand`], attaches the
//! bearer token, and on `401` refreshes once and retries once. A failed
//! refresh drops the session: every later call fails fast with
//! [`SyncError::Unauthenticated`] until [`AuthSession::login`].

use std::future::Future;
use std::sync::Arc;

use homesync_domain::auth::AuthTokens;
use homesync_domain::error::SyncError;
use homesync_domain::time::{from_millis, now, to_millis};
use tokio::sync::watch;

use crate::ports::{CommandRequest, KeyValueStore, RemoteCommand, RemoteResponse, TokenRefresher};

pub const TOKEN_KEY: &str = "auth.token";
pub const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";
pub const EXPIRES_AT_KEY: &str = "auth.expires_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated,
}

/// Token material backed by a key-value store.
pub struct AuthSession<K> {
    store: K,
    state: watch::Sender<SessionState>,
}

impl<K: KeyValueStore> AuthSession<K> {
    /// Open the session; it is authenticated if a token was persisted.
    pub fn new(store: K) -> Self {
        let initial = if store.get(TOKEN_KEY).is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };
        let (state, _) = watch::channel(initial);
        Self { store, state }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Stored token material, if any.
    #[must_use]
    pub fn tokens(&self) -> Option<AuthTokens> {
        let access_token = self.store.get(TOKEN_KEY)?;
        let expires_at = self
            .store
            .get(EXPIRES_AT_KEY)
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(from_millis);
        Some(AuthTokens {
            access_token,
            refresh_token: self.store.get(REFRESH_TOKEN_KEY),
            expires_at,
        })
    }

    /// Persist fresh material and mark the session authenticated.
    pub fn login(&self, tokens: &AuthTokens) {
        self.store.set(TOKEN_KEY, &tokens.access_token);
        match &tokens.refresh_token {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh),
            None => self.store.remove(REFRESH_TOKEN_KEY),
        }
        match tokens.expires_at {
            Some(at) => self.store.set(EXPIRES_AT_KEY, &to_millis(at).to_string()),
            None => self.store.remove(EXPIRES_AT_KEY),
        }
        self.state.send_replace(SessionState::Authenticated);
    }

    /// Remove all material and mark the session unauthenticated.
    pub fn logout(&self) {
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY] {
            self.store.remove(key);
        }
        self.state.send_replace(SessionState::Unauthenticated);
    }
}

/// [`RemoteCommand`] decorator handling bearer tokens and refresh.
pub struct AuthenticatedCommand<C, R, K> {
    inner: C,
    refresher: R,
    session: Arc<AuthSession<K>>,
}

impl<C, R, K> AuthenticatedCommand<C, R, K>
where
    C: RemoteCommand,
    R: TokenRefresher,
    K: KeyValueStore,
{
    pub fn new(inner: C, refresher: R, session: Arc<AuthSession<K>>) -> Self {
        Self {
            inner,
            refresher,
            session,
        }
    }

    async fn refresh(&self, current: &AuthTokens) -> Result<AuthTokens, SyncError> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            tracing::warn!("no refresh token, dropping session");
            self.session.logout();
            return Err(SyncError::Unauthenticated);
        };
        match self.refresher.refresh(refresh_token).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token.to_string());
                }
                self.session.login(&fresh);
                tracing::info!("access token refreshed");
                Ok(fresh)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, dropping session");
                self.session.logout();
                Err(SyncError::Unauthenticated)
            }
        }
    }
}

impl<C, R, K> RemoteCommand for AuthenticatedCommand<C, R, K>
where
    C: RemoteCommand,
    R: TokenRefresher,
    K: KeyValueStore,
{
    fn execute(
        &self,
        request: CommandRequest,
    ) -> impl Future<Output = Result<RemoteResponse, SyncError>> + Send {
        async move {
            if self.session.state() == SessionState::Unauthenticated {
                return Err(SyncError::Unauthenticated);
            }
            let Some(mut tokens) = self.session.tokens() else {
                self.session.logout();
                return Err(SyncError::Unauthenticated);
            };
            if tokens.is_expired(now()) {
                tracing::debug!("access token expired, refreshing before call");
                tokens = self.refresh(&tokens).await?;
            }

            let response = self
                .inner
                .execute(request.clone().with_bearer(&tokens.access_token))
                .await?;
            if response.status != 401 {
                return Ok(response);
            }

            tracing::debug!(path = %request.path, "unauthorized, refreshing token");
            let fresh = self.refresh(&tokens).await?;
            self.inner
                .execute(request.with_bearer(fresh.access_token))
                .await
        }
    }
}
