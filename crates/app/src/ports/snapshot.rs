//! Snapshot port — pull-based state used when no push connection is live.

use std::future::Future;

use homesync_domain::entity::StateUpdate;
use homesync_domain::error::SyncError;
use homesync_domain::music::PlayerState;

/// Fetches full state from the remote side.
pub trait SnapshotSource: Send + Sync + 'static {
    /// Current state of every device.
    fn fetch_devices(&self) -> impl Future<Output = Result<Vec<StateUpdate>, SyncError>> + Send;

    /// Current player state; `None` when the server answered `204`.
    fn fetch_player(&self) -> impl Future<Output = Result<Option<PlayerState>, SyncError>> + Send;
}
