//! Stale-null suppression for "nothing active" pushes.

use std::time::Duration;

use tokio::time::Instant;

/// Window during which an empty push cannot clear valid state.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Tracks when valid state was last seen and decides whether an explicit
/// empty push may clear it.
#[derive(Debug, Clone)]
pub struct StaleNullGuard {
    window: Duration,
    last_valid: Option<Instant>,
}

impl Default for StaleNullGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl StaleNullGuard {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_valid: None,
        }
    }

    pub fn record_valid(&mut self) {
        self.last_valid = Some(Instant::now());
    }

    /// Whether an empty push should be applied.
    ///
    /// Always true when nothing valid is held; otherwise only once the
    /// window has elapsed since the last valid update.
    #[must_use]
    pub fn should_clear(&self, has_valid_state: bool) -> bool {
        if !has_valid_state {
            return true;
        }
        self.last_valid
            .is_none_or(|at| at.elapsed() > self.window)
    }
}
