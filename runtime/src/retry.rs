//! Exponential backoff for effects that talk to flaky collaborators.
//!
//! A persist effect that hits a busy disk should try again a few times
//! before it reports the store as degraded. [`retry_with_predicate`] runs an
//! operation until it succeeds, fails permanently, or runs out of attempts.
//!
//! ```rust
//! use turnstile_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(2)
//!     .initial_delay(Duration::from_millis(50))
//!     .build();
//!
//! let written = retry_with_predicate(
//!     policy,
//!     || async { Ok::<_, String>(3) },
//!     |err: &String| err.starts_with("busy"),
//! )
//! .await?;
//! assert_eq!(written, 3);
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry.
///
/// The delay before retry `n` (zero-based) is
/// `initial_delay * multiplier^n`, never more than `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// Three retries starting at 100ms, doubling, capped at 30s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start from the defaults and override selectively.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `retry` (zero-based).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )] // Millisecond delays fit comfortably in f64 and u64
    pub fn delay_for_attempt(&self, retry: usize) -> Duration {
        let cap_ms = self.max_delay.as_millis() as f64;
        let factor = self.multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;

        if delay_ms.is_finite() && delay_ms < cap_ms {
            Duration::from_millis(delay_ms as u64)
        } else {
            self.max_delay
        }
    }
}

/// Builder returned by [`RetryPolicy::builder`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Upper bound for any single delay.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor between consecutive delays.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Run `operation`, retrying failures that `is_retryable` accepts.
///
/// # Errors
///
/// Returns the first error `is_retryable` rejects, or the last error after
/// `policy.max_retries` retries.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(retries, "Succeeded after retrying");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::warn!(error = %err, "Permanent failure, not retrying");
            return Err(err);
        }
        if retries >= policy.max_retries {
            tracing::error!(retries, error = %err, "Giving up");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(retries);
        tracing::warn!(retry = retries + 1, delay_ms = delay.as_millis(), error = %err, "Transient failure, retrying");
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}
