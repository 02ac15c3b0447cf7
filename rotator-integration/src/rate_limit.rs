use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Inner {
    /// Maximum burst size (full bucket).
    capacity: f64,
    tokens: f64,
    /// Steady-state refill rate in tokens per second.
    qps: f64,
    last_refill: Instant,
    /// Multiplier applied to the wait interval after venue throttling.
    /// 1 in steady state, doubles per violation up to `max_penalty`.
    penalty: u32,
    max_penalty: u32,
}

impl Inner {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let effective_qps = self.qps / f64::from(self.penalty);
        self.tokens = f64::min(self.capacity, self.tokens + elapsed * effective_qps);
        self.last_refill = now;
    }

    /// Duration until one whole token is available at the current rate.
    fn time_to_token(&self) -> Duration {
        let effective_qps = self.qps / f64::from(self.penalty);
        let deficit = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(deficit / effective_qps)
    }
}

/// Token bucket gating every outbound request: capacity `burst` tokens,
/// refilled at `qps` tokens per second. Callers block in [`Self::acquire`]
/// until a token is available.
///
/// Venue throttling reported via [`Self::report_violation`] halves the
/// effective refill rate (doubling per further violation, bounded), and
/// [`Self::reset_backoff`] restores the steady state after a success.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5.0, 10)
    }
}

impl RateLimiter {
    /// Construct a new [`RateLimiter`] refilling at `qps` tokens per second
    /// with burst capacity `burst`.
    pub fn new(qps: f64, burst: u32) -> Self {
        let qps = qps.max(0.1);
        let capacity = f64::from(burst.max(1));
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                tokens: capacity,
                qps,
                last_refill: Instant::now(),
                penalty: 1,
                max_penalty: 16,
            })),
        }
    }

    /// Acquire a single token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                inner.refill();
                if inner.tokens >= 1.0 {
                    inner.tokens -= 1.0;
                    None
                } else {
                    Some(inner.time_to_token())
                }
            };
            match wait {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Report a venue rate limit violation, slowing the effective refill rate.
    pub async fn report_violation(&self) {
        let mut inner = self.inner.lock().await;
        inner.refill();
        inner.penalty = u32::min(inner.penalty.saturating_mul(2), inner.max_penalty);
    }

    /// Restore the steady-state refill rate.
    pub async fn reset_backoff(&self) {
        let mut inner = self.inner.lock().await;
        inner.refill();
        inner.penalty = 1;
    }
}
