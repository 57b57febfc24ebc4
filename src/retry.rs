//! Bounded exponential-backoff retry for transport faults
//!
//! Only errors for which [`Error::is_transient`] holds are retried. The
//! last fault is returned as-is once the attempts run out.

use std::future::Future;
use std::time::Duration;

use crate::common::{Error, Result};

/// Backoff multiplier applied per retry
const BACKOFF_MULTIPLIER: u32 = 2;

/// How often and how patiently to retry a transient fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero behaves like one.
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay to wait after the given zero-based failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(attempt))
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Run `operation`, retrying transient faults according to `policy`
///
/// The backoff is a tokio sleep, so dropping the returned future (for
/// instance under an outer `tokio::time::timeout`) aborts the loop.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    of = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient fault, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::debug!(attempts, "Giving up after transient faults: {}", e);
                }
                return Err(e);
            }
        }
    }
}

/// Convert an elapsed per-call timeout into a transient fault
pub(crate) fn timed_out(what: &str, limit: Duration) -> Error {
    Error::transport(
        crate::common::FaultKind::Timeout,
        format!("{} did not answer within {} ms", what, limit.as_millis()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FaultKind;
    use std::cell::Cell;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_permanent_transient_fault_is_tried_exactly_n_times() {
        for n in 1..=4 {
            let calls = Cell::new(0);
            let result: Result<()> = with_retry(&fast(n), || {
                calls.set(calls.get() + 1);
                async { Err(Error::transport(FaultKind::Timeout, "slow")) }
            })
            .await;

            assert_eq!(calls.get(), n);
            let err = result.unwrap_err();
            assert_eq!(err.fault_kind(), Some(FaultKind::Timeout));
        }
    }

    #[tokio::test]
    async fn test_non_transient_fault_is_tried_once() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&fast(5), || {
            calls.set(calls.get() + 1);
            async { Err(Error::Auth("bad credentials".into())) }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_faults() {
        let calls = Cell::new(0);
        let result = with_retry(&fast(3), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(Error::transport(FaultKind::Connection, "reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let _: Result<()> = with_retry(&fast(0), || {
            calls.set(calls.get() + 1);
            async { Err(Error::transport(FaultKind::Timeout, "slow")) }
        })
        .await;
        assert_eq!(calls.get(), 1);
    }
}
