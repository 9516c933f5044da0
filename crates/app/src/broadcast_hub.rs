//! In-process broadcast hub backed by a tokio broadcast channel.
//!
//! Delivery is at-most-once with no replay: a client only sees envelopes
//! sent after it subscribed, and a client that falls behind loses the
//! oldest envelopes instead of slowing the others down.

use tokio::sync::broadcast;

use homesync_domain::envelope::BroadcastEnvelope;
use homesync_domain::error::ValidationError;
use homesync_domain::time::now;

/// Default number of envelopes buffered per client.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fans envelopes out to every connected push client.
#[derive(Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<BroadcastEnvelope>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastHub {
    /// Create a hub buffering up to `capacity` envelopes per client.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a client. It receives envelopes sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEnvelope> {
        self.sender.subscribe()
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Validate, timestamp if needed, and send to every connected client.
    ///
    /// Returns how many clients the envelope was queued for; zero clients
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyEventType`] for a blank `type`.
    pub fn notify(&self, mut envelope: BroadcastEnvelope) -> Result<usize, ValidationError> {
        envelope.validate()?;
        envelope.stamp(now());
        let kind = envelope.kind.clone();
        // send fails only when there are no receivers
        let delivered = self.sender.send(envelope).unwrap_or(0);
        tracing::debug!(kind = %kind, delivered, "broadcast envelope");
        Ok(delivered)
    }
}
