use std::time::Duration;

/// Chooses how long an ingestion loop waits before its next cycle.
///
/// `consecutive_failures` is 0 after a successful cycle and counts up while
/// a source keeps failing. Policies are stateless; each loop tracks its own
/// failure count.
pub trait RetryPolicy: Send + Sync {
    fn next_delay(&self, consecutive_failures: u32) -> Duration;
}

/// Always waits the configured poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval(pub Duration);

impl RetryPolicy for FixedInterval {
    fn next_delay(&self, _consecutive_failures: u32) -> Duration {
        self.0
    }
}

/// Waits `base` after a success and doubles per consecutive failure, up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let factor = 1u32.checked_shl(consecutive_failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}
