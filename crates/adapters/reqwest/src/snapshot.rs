//! Device and player snapshots for the polling fallback.

use std::future::Future;

use homesync_app::base_url::join;
use homesync_app::ports::{BaseUrlProvider, SnapshotSource};
use homesync_domain::entity::StateUpdate;
use homesync_domain::error::SyncError;
use homesync_domain::frame::{DEVICE_STATE, PushFrame, RawFrame};
use homesync_domain::music::PlayerState;
use reqwest::StatusCode;

use crate::error::{ReqwestError, check_status};

pub const DEFAULT_DEVICES_PATH: &str = "/api/devices";
pub const DEFAULT_PLAYER_PATH: &str = "/api/player";

/// [`SnapshotSource`] reading two JSON endpoints.
///
/// The devices endpoint returns an array of `{deviceId, attributes,
/// timestamp}` objects; malformed entries are logged and skipped. The player
/// endpoint returns a player state, or `204` when nothing is active.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource<B> {
    http: reqwest::Client,
    base_url: B,
    devices_path: String,
    player_path: String,
}

impl<B: BaseUrlProvider> HttpSnapshotSource<B> {
    pub fn new(http: reqwest::Client, base_url: B) -> Self {
        Self {
            http,
            base_url,
            devices_path: DEFAULT_DEVICES_PATH.to_string(),
            player_path: DEFAULT_PLAYER_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_paths(mut self, devices: impl Into<String>, player: impl Into<String>) -> Self {
        self.devices_path = devices.into();
        self.player_path = player.into();
        self
    }

    async fn get_json(&self, path: &str) -> Result<Option<serde_json::Value>, ReqwestError> {
        let url = join(&self.base_url.base_url(), path);
        let response = check_status(self.http.get(&url).send().await?)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

fn parse_devices(value: serde_json::Value) -> Vec<StateUpdate> {
    let serde_json::Value::Array(entries) = value else {
        tracing::warn!("device snapshot is not an array, ignoring");
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| {
            match PushFrame::parse(&RawFrame::new(Some(DEVICE_STATE), entry.to_string())) {
                Ok(PushFrame::DeviceState(update)) => Some(update),
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed device snapshot");
                    None
                }
            }
        })
        .collect()
}

impl<B: BaseUrlProvider + 'static> SnapshotSource for HttpSnapshotSource<B> {
    fn fetch_devices(&self) -> impl Future<Output = Result<Vec<StateUpdate>, SyncError>> + Send {
        async move {
            let value = self.get_json(&self.devices_path).await?;
            Ok(value.map(parse_devices).unwrap_or_default())
        }
    }

    fn fetch_player(&self) -> impl Future<Output = Result<Option<PlayerState>, SyncError>> + Send {
        async move {
            match self.get_json(&self.player_path).await? {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(value) => serde_json::from_value(value)
                    .map(Some)
                    .map_err(|err| ReqwestError::from(err).into()),
            }
        }
    }
}
