//! Retry policies: decide whether another attempt may run, and after how long.

use std::time::Duration;

use crate::domain::{RetryContext, RetryDecision};
use crate::ports::RetryPolicy;

/// Default policy.
///
/// Retries while `attempt < retry_limit`. The delay before attempt `n + 1` is
/// `backoff_base * 2^n`, capped by the descriptor's max retry interval; a zero
/// interval means retries run back to back.
///
/// Example with base=1s, max interval=5s:
/// - after attempt 0: 1s
/// - after attempt 1: 2s
/// - after attempt 2: 4s
/// - after attempt 3: 5s (capped)
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    pub backoff_base: Duration,
}

impl DefaultRetryPolicy {
    pub fn new(backoff_base: Duration) -> Self {
        Self { backoff_base }
    }

    pub fn next_delay(&self, attempt: u32, max_interval: Duration) -> Duration {
        if max_interval.is_zero() {
            return Duration::ZERO;
        }
        let secs = self.backoff_base.as_secs_f64() * 2f64.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = secs.min(max_interval.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(max_interval)
    }
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn decide(&self, context: &RetryContext) -> RetryDecision {
        if context.attempt >= context.retry_limit {
            return RetryDecision::GiveUp {
                reason: format!(
                    "Max retries reached: {}/{}",
                    context.attempt, context.retry_limit
                ),
            };
        }
        let delay = self.next_delay(context.attempt, context.max_retry_interval);
        RetryDecision::Retry {
            delay,
            reason: format!(
                "Retry {}/{} after {:?}",
                context.attempt + 1,
                context.retry_limit,
                delay
            ),
        }
    }
}

/// Exponential backoff with a configurable multiplier.
///
/// delay = base_delay * multiplier^attempt. Capped by the descriptor's max
/// retry interval only when that interval is non-zero.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
        }
    }

    pub fn next_delay(&self, attempt: u32, max_interval: Duration) -> Duration {
        let secs = self.base_delay.as_secs_f64()
            * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        if max_interval.is_zero() {
            delay
        } else {
            delay.min(max_interval)
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn decide(&self, context: &RetryContext) -> RetryDecision {
        if context.attempt >= context.retry_limit {
            return RetryDecision::GiveUp {
                reason: format!(
                    "Max retries reached: {}/{}",
                    context.attempt, context.retry_limit
                ),
            };
        }
        let delay = self.next_delay(context.attempt, context.max_retry_interval);
        RetryDecision::Retry {
            delay,
            reason: format!("Backoff retry {} after {:?}", context.attempt + 1, delay),
        }
    }
}

/// Never retries, whatever the descriptor allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn decide(&self, _context: &RetryContext) -> RetryDecision {
        RetryDecision::GiveUp {
            reason: "retries disabled".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureCause, TransportError};
    use http::StatusCode;
    use rstest::rstest;

    fn ctx(attempt: u32, limit: u32, max_interval: Duration) -> RetryContext {
        RetryContext {
            attempt,
            cause: FailureCause::Transport(TransportError::connect("refused")),
            retry_limit: limit,
            max_retry_interval: max_interval,
        }
    }

    #[rstest]
    #[case::first(0, 2, true)]
    #[case::second(1, 2, true)]
    #[case::exhausted(2, 2, false)]
    #[case::no_retries(0, 0, false)]
    fn default_policy_allows_while_under_limit(
        #[case] attempt: u32,
        #[case] limit: u32,
        #[case] allowed: bool,
    ) {
        let policy = DefaultRetryPolicy::default();
        assert_eq!(policy.should_retry(&ctx(attempt, limit, Duration::ZERO)), allowed);
    }

    #[test]
    fn default_policy_ignores_cause_kind() {
        let policy = DefaultRetryPolicy::default();
        let mut c = ctx(0, 1, Duration::ZERO);
        c.cause = FailureCause::Application {
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(policy.should_retry(&c));
    }

    #[test]
    fn zero_max_interval_means_no_wait() {
        let policy = DefaultRetryPolicy::new(Duration::from_secs(1));
        match policy.decide(&ctx(0, 3, Duration::ZERO)) {
            RetryDecision::Retry { delay, .. } => assert_eq!(delay, Duration::ZERO),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = DefaultRetryPolicy::new(Duration::from_secs(1));
        let cap = Duration::from_secs(5);

        assert_eq!(policy.next_delay(0, cap), Duration::from_secs(1));
        assert_eq!(policy.next_delay(1, cap), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2, cap), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3, cap), cap);
        assert_eq!(policy.next_delay(u32::MAX, cap), cap);
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = ExponentialBackoff::new(Duration::from_millis(100), 3.0);

        let d0 = policy.next_delay(0, Duration::ZERO);
        let d1 = policy.next_delay(1, Duration::ZERO);
        let d2 = policy.next_delay(2, Duration::ZERO);

        assert_eq!(d0, Duration::from_millis(100));
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert_eq!(policy.next_delay(2, Duration::from_millis(250)), Duration::from_millis(250));
    }

    #[test]
    fn exponential_backoff_saturates_instead_of_panicking() {
        let policy = ExponentialBackoff::new(Duration::from_secs(1), 10.0);
        assert_eq!(policy.next_delay(1000, Duration::ZERO), Duration::MAX);
    }

    #[test]
    fn never_retry_gives_up() {
        let decision = NeverRetry.decide(&ctx(0, 10, Duration::ZERO));
        assert!(!decision.is_retry());
        assert_eq!(decision.reason(), "retries disabled");
    }
}
