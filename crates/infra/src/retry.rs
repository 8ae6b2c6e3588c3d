//! Bounded retry with backoff for storage calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use wattcast_core::{DomainError, DomainResult};

use crate::storage::StorageError;

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    #[default]
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (1 = no retries)
    pub max_attempts: u32,
    /// Base delay between retries, in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay cap, in milliseconds
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: delay.as_millis() as u64,
            max_delay_ms: delay.as_millis() as u64,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_attempts == 0 {
            return Err(DomainError::validation("retry max_attempts must be >= 1"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(DomainError::validation("retry max_delay_ms must be >= base_delay_ms"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(DomainError::validation("retry jitter must be within 0..=1"));
        }
        Ok(())
    }

    /// Delay before retrying after failed attempt number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay_ms as f64;
        let max_ms = self.max_delay_ms as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * attempt as f64).min(max_ms),
        };

        // Deterministic jitter derived from the attempt number.
        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Run `op`, retrying transient storage failures per `policy`.
///
/// Transient failures that outlive the policy become `UpstreamUnavailable`;
/// `NotFound` maps to `NotFound`; permanent failures are not retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> DomainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(StorageError::NotFound(what)) => return Err(DomainError::not_found(what)),
            Err(StorageError::Transient(msg)) if policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %msg, "transient storage failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err @ StorageError::Transient(_)) => {
                return Err(DomainError::upstream(format!(
                    "{operation} failed after {attempt} attempt(s): {err}"
                )));
            }
            Err(err @ StorageError::Permanent(_)) => {
                return Err(DomainError::upstream(format!("{operation}: {err}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn default_policy_caps_at_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(2));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let policy = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            max_delay_ms: 10_000,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let out = with_retry(&RetryPolicy::default(), "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::Transient("flaky".into()))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_become_upstream_unavailable() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&RetryPolicy::default(), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StorageError::Transient("down".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::UpstreamUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_and_not_found_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&RetryPolicy::default(), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StorageError::NotFound("building B9".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = with_retry(&RetryPolicy::default(), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StorageError::Permanent("rejected".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::UpstreamUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
