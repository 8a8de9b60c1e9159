//! Bounded retry for flaky connections
//!
//! Remote hosts created in the same run are often not reachable yet when a
//! provisioner first connects. [`retry`] repeats an operation a fixed number
//! of times and only surfaces a hard failure after the last attempt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds)
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Upper bound for any single delay (milliseconds)
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
    /// Delay multiplier between attempts; 1.0 keeps the interval fixed
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    24
}
fn default_interval() -> u64 {
    5000
}
fn default_max_interval() -> u64 {
    5000
}
fn default_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval(),
            max_interval_ms: default_max_interval(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Fixed interval between attempts
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        let interval_ms = interval.as_millis() as u64;
        Self {
            max_attempts,
            interval_ms,
            max_interval_ms: interval_ms,
            multiplier: 1.0,
        }
    }

    /// Growing interval, capped at `max_interval`
    pub fn exponential(
        max_attempts: u32,
        initial: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            interval_ms: initial.as_millis() as u64,
            max_interval_ms: max_interval.as_millis() as u64,
            multiplier,
        }
    }

    /// Retry immediately; for tests and local targets
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay after the failed attempt number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.interval_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error not worth retrying
    #[error("{0}")]
    Aborted(E),

    /// Every attempt failed
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    /// The last error observed
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Aborted(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` attempts have been made
///
/// `op` receives the 0-based attempt number. No delay follows the last attempt.
pub async fn retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut op: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Aborted(e)),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                let delay = config.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fixed_delay() {
        let config = RetryConfig::fixed(24, Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(config, RetryConfig::default());
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let config = RetryConfig::exponential(
            5,
            Duration::from_millis(1000),
            Duration::from_millis(10000),
            2.0,
        );

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(10000));
    }

    #[test]
    fn test_first_success_skips_the_delay() {
        let result: Result<u32, RetryError<String>> = tokio_test::block_on(retry(
            &RetryConfig::default(),
            |attempt| async move { Ok(attempt) },
            |_| true,
        ));

        assert_eq!(tokio_test::assert_ok!(result), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::immediate(24);

        let result: Result<(), RetryError<String>> = retry(
            &config,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("connection refused".to_string()) }
            },
            |_| true,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 24);
        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 24);
                assert_eq!(last_error, "connection refused");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_succeeds_once_reachable() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::immediate(24);

        let result = retry(
            &config,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("unreachable".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_aborts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::immediate(24);

        let result: Result<(), _> = retry(
            &config,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permission denied".to_string()) }
            },
            |e: &String| !e.contains("permission"),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Aborted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let config = RetryConfig::fixed(3, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let result: Result<(), RetryError<String>> =
            retry(&config, |_| async { Err("down".to_string()) }, |_| true).await;

        let elapsed = start.elapsed();
        assert!(result.is_err());
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }
}
