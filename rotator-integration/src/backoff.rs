use rand::Rng;
use std::time::Duration;

/// Exponential backoff policy: `base * 2^attempt` capped at `max`, with a
/// uniform jitter of up to 25% applied to every delay.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub max_retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max,
            max_retries,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
            .min(self.max);

        let jitter = rand::rng().random_range(-0.25..=0.25);
        let jittered = exp.as_secs_f64() * (1.0 + jitter);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}
