//! Backoff policy for redemption retries.
//!
//! Each retry waits `initial_delay * multiplier^(attempt - 1)`, capped at
//! `max_delay`, then scaled by a random factor in `[0.5, 1.0]` so that
//! scanners racing on the same ticket fall out of step.

use std::time::Duration;

use rand::Rng;

/// Retry policy for compare-and-set conflicts.
///
/// # Default Values
///
/// - `max_attempts`: 5 (total attempts, including the first)
/// - `initial_delay`: 10ms
/// - `max_delay`: 200ms
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based),
    /// without jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Delay before retrying after failed attempt number `attempt`, with jitter.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        self.base_delay(attempt).mul_f64(factor)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set total attempts. Values below 1 are raised to 1.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_five_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
    }

    #[test]
    fn base_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(10));
        assert_eq!(policy.base_delay(2), Duration::from_millis(20));
        assert_eq!(policy.base_delay(3), Duration::from_millis(40));
        assert_eq!(policy.base_delay(10), Duration::from_millis(200));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_millis(200));
    }

    #[test]
    fn jittered_delay_stays_within_half_to_full() {
        let policy = RetryPolicy::default();
        for attempt in 1..=6 {
            let base = policy.base_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for_attempt(attempt);
                assert!(delay <= base + Duration::from_micros(1), "{delay:?} > {base:?}");
                // float scaling may round by a nanosecond
                assert!(
                    delay + Duration::from_micros(1) >= base / 2,
                    "{delay:?} < half of {base:?}"
                );
            }
        }
    }

    #[test]
    fn builder_overrides_defaults() {
        let policy = RetryPolicy::builder()
            .max_attempts(0)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(4))
            .multiplier(3.0)
            .build();

        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay(2), Duration::from_millis(3));
        assert_eq!(policy.base_delay(3), Duration::from_millis(4));
    }
}
