//! Linear-backoff retry policy for transient poll failures.
//!
//! While waiting on a job, an unreachable server is retried up to
//! [`RetryPolicy::limit`] consecutive times. The n-th retry waits
//! `n * backoff`, never past the caller's deadline.

use std::time::Duration;

/// Tunable parameters for poll retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive transient failures tolerated before giving up.
    pub limit: u32,
    /// Delay unit; the n-th retry waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    /// Whether another retry is allowed after `failures` consecutive
    /// transient failures.
    pub fn allows(&self, failures: u32) -> bool {
        failures <= self.limit
    }
}

/// Clamp a delay so it never runs past the remaining time budget.
pub fn capped(delay: Duration, remaining: Duration) -> Duration {
    delay.min(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy {
            limit: 3,
            backoff: Duration::from_millis(200),
        };
        let delays: Vec<u128> = (1..=4).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![200, 400, 600, 800]);
    }

    #[test]
    fn zero_attempt_has_no_delay() {
        assert_eq!(RetryPolicy::default().delay_for(0), Duration::ZERO);
    }

    #[test]
    fn allows_up_to_limit() {
        let policy = RetryPolicy {
            limit: 2,
            ..Default::default()
        };
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn zero_limit_allows_nothing() {
        let policy = RetryPolicy {
            limit: 0,
            ..Default::default()
        };
        assert!(!policy.allows(1));
    }

    #[test]
    fn capped_respects_remaining_budget() {
        assert_eq!(
            capped(Duration::from_secs(5), Duration::from_secs(2)),
            Duration::from_secs(2)
        );
        assert_eq!(
            capped(Duration::from_secs(1), Duration::from_secs(2)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = RetryPolicy {
            limit: u32::MAX,
            backoff: Duration::MAX,
        };
        assert_eq!(policy.delay_for(3), Duration::MAX);
    }
}
