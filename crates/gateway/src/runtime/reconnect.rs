//! Bring-up retry policy: plain exponential back-off, no jitter.

use std::time::Duration;

use sr_domain::config::ReconnectConfig;

/// Upper bound on a single retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay of retry `n` is `backoff_base_secs^n` seconds.
    pub backoff_base_secs: u64,
    /// Retries allowed after the first failed bring-up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            backoff_base_secs: config.backoff_base_secs,
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt)).min(MAX_RETRY_DELAY)
    }

    /// Whether `attempts_made` retries already exhaust the budget.
    pub fn should_give_up(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.backoff_base_secs, 2);
        assert_eq!(p.max_attempts, 5);
    }

    #[test]
    fn delays_double_from_two_seconds() {
        let p = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| p.delay_for_attempt(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn gives_up_after_budget() {
        let p = ReconnectPolicy::default();
        assert!(!p.should_give_up(0));
        assert!(!p.should_give_up(4));
        assert!(p.should_give_up(5));
        assert!(p.should_give_up(6));
    }

    #[test]
    fn huge_delays_are_capped() {
        let p = ReconnectPolicy {
            backoff_base_secs: 10,
            max_attempts: 100,
        };
        assert_eq!(p.delay_for_attempt(90), MAX_RETRY_DELAY);

        let p = ReconnectPolicy {
            backoff_base_secs: u64::MAX,
            max_attempts: 3,
        };
        assert_eq!(p.delay_for_attempt(1), MAX_RETRY_DELAY);
        assert!(std::time::Instant::now().checked_add(p.delay_for_attempt(3)).is_some());
    }
}
