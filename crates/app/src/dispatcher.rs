//! Frame dispatcher — routes parsed push frames into the core.
//!
//! Malformed frames are logged and dropped here, so a bad frame never tears
//! down the connection that delivered it.

use std::sync::{Mutex, PoisonError};

use homesync_domain::auth::AuthStatus;
use homesync_domain::entity::StateUpdate;
use homesync_domain::frame::{PushFrame, RawFrame};
use homesync_domain::id::EntityId;
use homesync_domain::music::{MusicState, PlayerState};
use homesync_domain::time::{Timestamp, receipt_after};
use tokio::sync::watch;

use crate::ports::FrameSink;
use crate::stale_null::StaleNullGuard;
use crate::store::{ApplyOutcome, StateStore};

/// What happened to a player-state push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerOutcome {
    Store(ApplyOutcome),
    /// An empty push arrived too soon after valid state and was ignored.
    Suppressed,
}

/// [`FrameSink`] feeding the [`StateStore`] and the auth status channel.
pub struct FrameDispatcher {
    store: StateStore,
    auth_status: watch::Sender<AuthStatus>,
    guard: Mutex<StaleNullGuard>,
}

impl FrameDispatcher {
    #[must_use]
    pub fn new(store: StateStore, guard: StaleNullGuard) -> Self {
        let (auth_status, _) = watch::channel(AuthStatus::default());
        Self {
            store,
            auth_status,
            guard: Mutex::new(guard),
        }
    }

    /// Latest relay status, updated by `status` frames.
    #[must_use]
    pub fn auth_status(&self) -> watch::Receiver<AuthStatus> {
        self.auth_status.subscribe()
    }

    pub fn dispatch(&self, frame: PushFrame) {
        match frame {
            PushFrame::Status(status) => {
                tracing::debug!(
                    logged_in = status.logged_in,
                    connected_to_middleware = status.connected_to_middleware,
                    "relay status"
                );
                self.auth_status.send_replace(status);
            }
            PushFrame::DeviceState(update) => {
                self.store.apply_remote_update(update);
            }
            PushFrame::PlayerState { state, timestamp } => {
                self.apply_player_state(state, timestamp);
            }
            PushFrame::Error(message) => {
                tracing::warn!(relay_error = %message, "relay reported an error");
            }
        }
    }

    /// Feed a player state, or the "nothing active" sentinel, into the
    /// music pseudo-entity. Missing timestamps default to receipt time,
    /// kept strictly after the last accepted music timestamp.
    pub fn apply_player_state(
        &self,
        state: Option<PlayerState>,
        timestamp: Option<Timestamp>,
    ) -> PlayerOutcome {
        let timestamp = timestamp.unwrap_or_else(|| {
            receipt_after(
                self.store
                    .record(&EntityId::music())
                    .and_then(|record| record.last_updated),
            )
        });
        let mut guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let attributes = match state {
            Some(state) => {
                guard.record_valid();
                state.to_attributes()
            }
            None => {
                let current = MusicState::from_attributes(&self.store.get(&EntityId::music()));
                let has_valid_state = current.is_playing || current.track.is_some();
                if !guard.should_clear(has_valid_state) {
                    tracing::debug!("suppressing empty player state");
                    return PlayerOutcome::Suppressed;
                }
                PlayerState::cleared_attributes()
            }
        };
        drop(guard);
        PlayerOutcome::Store(self.store.apply_remote_update(StateUpdate::new(
            EntityId::music(),
            attributes,
            timestamp,
        )))
    }
}

impl FrameSink for FrameDispatcher {
    fn handle(&self, frame: RawFrame) {
        match PushFrame::parse(&frame) {
            Ok(parsed) => self.dispatch(parsed),
            Err(err) => {
                tracing::warn!(event = ?frame.event, error = %err, "dropping malformed frame");
            }
        }
    }
}
