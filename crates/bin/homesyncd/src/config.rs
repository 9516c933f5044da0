//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homesync.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use homesync_app::backoff::BackoffConfig;
use homesync_app::store::StoreConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub HTTP server settings.
    pub server: ServerConfig,
    /// Remote relay the client engine follows.
    pub relay: RelayConfig,
    /// State store timings.
    pub sync: SyncConfig,
    /// Reconnect backoff.
    pub backoff: BackoffSection,
    /// Key-value persistence.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Broadcast hub settings.
    pub hub: HubConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Serve the broadcast hub.
    pub enabled: bool,
}

/// Relay endpoints. The client engine only runs when `base_url` is set.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub base_url: Option<String>,
    pub stream_path: String,
    pub devices_path: String,
    pub player_path: String,
    pub refresh_path: String,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub debounce_ms: u64,
    pub stale_after_ms: u64,
    pub lock_ms: u64,
    pub grace_ms: u64,
    pub stale_null_window_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackoffSection {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_ceiling: u32,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Envelopes buffered per client before it starts lagging.
    pub capacity: usize,
}

impl Config {
    /// Load configuration from `homesync.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homesync.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMESYNC_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("HOMESYNC_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("HOMESYNC_RELAY_URL") {
            self.relay.base_url = Some(val).filter(|url| !url.is_empty());
        }
        if let Ok(val) = std::env::var("HOMESYNC_DATABASE_URL") {
            self.storage.url = val;
        }
        if let Ok(val) = std::env::var("HOMESYNC_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.backoff.base_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "backoff.base_delay_ms must be non-zero".to_string(),
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigError::Validation(
                "backoff.max_delay_ms must be at least backoff.base_delay_ms".to_string(),
            ));
        }
        if self.sync.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "sync.debounce_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            debounce: Duration::from_millis(self.sync.debounce_ms),
            stale_after: Duration::from_millis(self.sync.stale_after_ms),
            lock_window: Duration::from_millis(self.sync.lock_ms),
        }
    }

    #[must_use]
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(self.backoff.base_delay_ms),
            max_delay: Duration::from_millis(self.backoff.max_delay_ms),
            attempt_ceiling: self.backoff.attempt_ceiling,
        }
    }

    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.sync.grace_ms)
    }

    #[must_use]
    pub fn stale_null_window(&self) -> Duration {
        Duration::from_millis(self.sync.stale_null_window_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay.poll_interval_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enabled: true,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            stream_path: "/api/events/stream".to_string(),
            devices_path: "/api/devices".to_string(),
            player_path: "/api/player".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            stale_after_ms: 15_000,
            lock_ms: 2_000,
            grace_ms: 500,
            stale_null_window_ms: 10_000,
        }
    }
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            attempt_ceiling: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:homesync.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homesyncd=info,homesync=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
