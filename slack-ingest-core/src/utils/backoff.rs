//! Retry delays for the sidecar drain loop.

use std::time::Duration;

/// Delay before the first retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on any single delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffState {
    #[default]
    Healthy,
    /// Number of consecutive failures.
    Backoff(u32),
}

/// Exponential backoff: `initial * 2^(n-1)` after the n-th consecutive
/// failure, capped at `max`, reset by any success.
#[derive(Debug, Clone)]
pub struct Backoff {
    state: BackoffState,
    initial: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            state: BackoffState::Healthy,
            initial,
            max: max.max(initial),
        }
    }

    pub fn state(&self) -> BackoffState {
        self.state
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn on_failure(&mut self) -> Duration {
        let failures = match self.state {
            BackoffState::Healthy => 1,
            BackoffState::Backoff(n) => n.saturating_add(1),
        };
        self.state = BackoffState::Backoff(failures);
        self.delay(failures)
    }

    pub fn on_success(&mut self) {
        self.state = BackoffState::Healthy;
    }

    fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..7).map(|_| backoff.on_failure().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(backoff.state(), BackoffState::Backoff(7));
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::default();
        backoff.on_failure();
        backoff.on_failure();
        backoff.on_success();
        assert_eq!(backoff.state(), BackoffState::Healthy);
        assert_eq!(backoff.on_failure(), Duration::from_secs(1));
    }

    #[test]
    fn test_never_exceeds_cap() {
        let mut backoff = Backoff::default();
        for _ in 0..200 {
            assert!(backoff.on_failure() <= MAX_BACKOFF);
        }
    }
}
