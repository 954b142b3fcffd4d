//! Retry logic with exponential backoff
//!
//! Every request is attempted up to [`RetryConfig::max_attempts`] times. After a failed
//! attempt `n` (0-based) the loop sleeps `initial_delay * backoff_multiplier^n`, capped
//! at `max_delay`, before trying again. A server-provided `Retry-After` raises the delay
//! for that attempt. Permanent errors are returned immediately.
//!
//! # Example
//!
//! ```no_run
//! use contrib_report::retry::{IsRetryable, with_retry};
//! use contrib_report::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let value = with_retry(&config, |_attempt| async {
//!     Ok::<_, MyError>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{FetchCause, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, server errors, rate limiting) should
/// return `true`. Permanent failures (bad credentials, unknown repository) should return
/// `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Minimum delay requested by the remote side before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match &self.cause {
            FetchCause::Network(_) => true,
            // A truncated or garbled body is as transient as the connection that carried it
            FetchCause::Decode(_) => true,
            FetchCause::HttpStatus { status, .. } => match *status {
                // 403 is how GitHub reports an exhausted rate limit
                403 | 408 | 429 => true,
                s if s >= 500 => true,
                _ => false,
            },
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        FetchError::retry_after(self)
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The closure receives the 1-based attempt number, so errors it produces can record
/// which attempt failed.
///
/// # Returns
///
/// The first successful result, or the last error once `max_attempts` attempts have
/// failed. A `max_attempts` of 0 is treated as 1.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = retry_delay(config, attempt - 1, e.retry_after());

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Request failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Delay after failed attempt `failed_attempt` (0-based)
///
/// `initial_delay * backoff_multiplier^failed_attempt`, raised to `retry_after` when the
/// server asked for more, optionally jittered, and always capped at `max_delay`.
pub fn retry_delay(
    config: &RetryConfig,
    failed_attempt: u32,
    retry_after: Option<Duration>,
) -> Duration {
    let exponent = i32::try_from(failed_attempt).unwrap_or(i32::MAX);
    let backoff_nanos =
        (config.initial_delay.as_nanos() as f64 * config.backoff_multiplier.powi(exponent)).round();
    let mut delay = if backoff_nanos.is_finite() && backoff_nanos < config.max_delay.as_nanos() as f64
    {
        Duration::from_nanos(backoff_nanos.max(0.0) as u64)
    } else {
        config.max_delay
    };

    if config.jitter {
        delay = add_jitter(delay);
    }
    if let Some(requested) = retry_after {
        delay = delay.max(requested);
    }
    delay.min(config.max_delay)
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the result lies
/// between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
