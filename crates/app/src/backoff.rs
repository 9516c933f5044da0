//! Exponential reconnect backoff with a fixed cadence after the ceiling.

use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Attempts after which the exponent stops growing.
    pub attempt_ceiling: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_ceiling: 10,
        }
    }
}

/// Reconnect attempt counter.
///
/// `delay = min(base * 2^attempts, max)`; from the ceiling on, every retry
/// waits `max`. Only [`Backoff::reset`] brings the counter back to zero.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt; counts the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = if self.attempts >= self.config.attempt_ceiling {
            self.config.max_delay
        } else {
            let factor = 1_u32.checked_shl(self.attempts).unwrap_or(u32::MAX);
            self.config
                .base_delay
                .saturating_mul(factor)
                .min(self.config.max_delay)
        };
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(delays: &[Duration]) -> Vec<u128> {
        delays.iter().map(Duration::as_millis).collect()
    }

    #[test]
    fn should_grow_exponentially_and_cap() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            millis(&delays),
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn should_retry_at_max_forever_after_ceiling() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        for _ in 0..100 {
            backoff.next_delay();
        }
        assert_eq!(backoff.attempts(), 100);
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn should_restart_from_base_after_reset() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn should_use_max_cadence_past_a_low_ceiling() {
        let mut backoff = Backoff::new(BackoffConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            attempt_ceiling: 2,
        });
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay()).collect();
        assert_eq!(millis(&delays), vec![100, 200, 5_000, 5_000]);
    }
}
