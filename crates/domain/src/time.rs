//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp carried by remote updates and envelopes.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Receipt time for an update that carries no timestamp of its own.
///
/// Never earlier than one millisecond past `last`, so a remote clock running
/// ahead of ours cannot make the update look stale.
#[must_use]
pub fn receipt_after(last: Option<Timestamp>) -> Timestamp {
    let current = now();
    last.and_then(|last| last.checked_add_signed(TimeDelta::milliseconds(1)))
        .map_or(current, |next| next.max(current))
}

/// Convert milliseconds since the Unix epoch, as carried on the wire.
#[must_use]
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(millis)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}
