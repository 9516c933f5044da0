//! `SQLite` implementation of [`KeyValueStore`].
//!
//! The port is synchronous, so every row is loaded into memory when the
//! store opens. Reads hit the cache; writes update the cache and are queued
//! to a background writer that applies them in order.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};

use homesync_app::ports::KeyValueStore;
use homesync_domain::time::{now, to_millis};

use crate::error::StorageError;

const SELECT_ALL: &str = "SELECT key, value FROM kv";
const UPSERT: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const DELETE_BY_KEY: &str = "DELETE FROM kv WHERE key = ?";

enum Write {
    Set { key: String, value: String },
    Remove { key: String },
    Flush(oneshot::Sender<()>),
}

/// `SQLite`-backed key-value store with a write-through cache.
///
/// Dropping the store closes the queue; writes already queued still drain.
pub struct SqliteKeyValueStore {
    cache: Mutex<HashMap<String, String>>,
    writes: mpsc::UnboundedSender<Write>,
}

impl SqliteKeyValueStore {
    /// Load every stored entry and start the background writer.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the initial load fails.
    pub async fn open(pool: SqlitePool) -> Result<Self, StorageError> {
        let rows: Vec<(String, String)> = sqlx::query_as(SELECT_ALL).fetch_all(&pool).await?;
        tracing::debug!(entries = rows.len(), "key-value store loaded");
        let (writes, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(pool, receiver));
        Ok(Self {
            cache: Mutex::new(rows.into_iter().collect()),
            writes,
        })
    }

    /// Wait until every write queued so far has reached the database.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writes.send(Write::Flush(done)).is_err() || wait.await.is_err() {
            tracing::debug!("key-value writer stopped before flush completed");
        }
    }

    fn queue(&self, write: Write) {
        if self.writes.send(write).is_err() {
            tracing::warn!("key-value writer stopped, change kept in memory only");
        }
    }
}

async fn run_writer(pool: SqlitePool, mut receiver: mpsc::UnboundedReceiver<Write>) {
    while let Some(write) = receiver.recv().await {
        let result = match write {
            Write::Set { key, value } => sqlx::query(UPSERT)
                .bind(&key)
                .bind(value)
                .bind(to_millis(now()))
                .execute(&pool)
                .await
                .map(|_| ())
                .map_err(|err| (key, err)),
            Write::Remove { key } => sqlx::query(DELETE_BY_KEY)
                .bind(&key)
                .execute(&pool)
                .await
                .map(|_| ())
                .map_err(|err| (key, err)),
            Write::Flush(done) => {
                if done.send(()).is_err() {
                    tracing::debug!("flush waiter went away");
                }
                Ok(())
            }
        };
        if let Err((key, err)) = result {
            tracing::warn!(key = %key, error = %err, "failed to persist key-value change");
        }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.queue(Write::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn remove(&self, key: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.queue(Write::Remove {
            key: key.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn pool() -> SqlitePool {
        Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap()
        .pool()
        .clone()
    }

    #[tokio::test]
    async fn should_return_none_when_key_missing() {
        let store = SqliteKeyValueStore::open(pool().await).await.unwrap();
        assert_eq!(store.get("auth.token"), None);
    }

    #[tokio::test]
    async fn should_read_back_immediately_after_set() {
        let store = SqliteKeyValueStore::open(pool().await).await.unwrap();

        store.set("auth.token", "abc");

        assert_eq!(store.get("auth.token").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn should_persist_across_reopen_when_flushed() {
        let pool = pool().await;
        let store = SqliteKeyValueStore::open(pool.clone()).await.unwrap();
        store.set("auth.token", "abc");
        store.set("auth.token", "def");
        store.set("auth.refresh_token", "r");
        store.remove("auth.refresh_token");
        store.flush().await;

        let reopened = SqliteKeyValueStore::open(pool).await.unwrap();

        assert_eq!(reopened.get("auth.token").as_deref(), Some("def"));
        assert_eq!(reopened.get("auth.refresh_token"), None);
    }

    #[tokio::test]
    async fn should_complete_flush_when_database_writes_fail() {
        let pool = pool().await;
        let store = SqliteKeyValueStore::open(pool.clone()).await.unwrap();
        pool.close().await;

        store.set("auth.token", "abc");
        store.flush().await;

        assert_eq!(store.get("auth.token").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn should_restore_auth_session_when_reopened() {
        use std::sync::Arc;

        use homesync_app::auth::{AuthSession, SessionState};
        use homesync_domain::auth::AuthTokens;

        let pool = pool().await;
        let store = Arc::new(SqliteKeyValueStore::open(pool.clone()).await.unwrap());
        let session = AuthSession::new(Arc::clone(&store));
        session.login(&AuthTokens {
            access_token: "abc".to_string(),
            refresh_token: None,
            expires_at: None,
        });
        store.flush().await;

        let restored = AuthSession::new(SqliteKeyValueStore::open(pool).await.unwrap());

        assert_eq!(restored.state(), SessionState::Authenticated);
    }
}
