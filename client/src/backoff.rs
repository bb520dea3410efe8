use rand::{Rng, RngCore};
use std::time::Duration;

/// Exponential backoff between retries, capped at `max`.
pub(crate) struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Delay before the next attempt. Each call doubles the base delay.
    pub(crate) fn next_delay(&mut self, rng: &mut impl RngCore) -> Duration {
        let delay = equal_jitter(rng, self.current);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Pick a delay in `[base / 2, base]`.
fn equal_jitter(rng: &mut impl RngCore, base: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if base_ms <= 1 {
        return base;
    }
    let half_ms = base_ms / 2;
    Duration::from_millis(half_ms.saturating_add(rng.gen_range(0..=half_ms)))
}
