//! Retry policy: exponential backoff with full jitter.

use std::time::Duration;

use rand::Rng;

/// Retry policy applied by the transport.
///
/// A request is retried on network-level failures (no response received) and
/// on responses with status >= 500, up to `retries` additional attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub retries: u32,
    /// Base delay unit for backoff.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given cap and base delay.
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    /// Whether a received status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        status >= 500
    }

    /// Whether another attempt is allowed after `attempt` retries so far.
    pub fn attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.retries
    }

    /// Delay before retry attempt `n` (1-indexed):
    /// `base * 2^(n-1) + random(0, base)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(32));
        let jitter = if base > 0 {
            rand::rng().random_range(0..base)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}
