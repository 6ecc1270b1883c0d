//! Exponential-backoff retry executor
//!
//! Wraps a fallible async operation: every attempt is bounded by an optional
//! per-call timeout, failures wait `initial_delay * 2^attempt` (capped, with
//! optional jitter) before the next try, and the last error is returned once
//! the attempt budget is spent.

use crate::config::RetryConfig;
use crate::error::TrackerError;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of attempts (first call included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError<E> {
    /// The operation returned an error
    Failed(E),
    /// The operation did not finish within the per-call timeout
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "{}", e),
            Self::TimedOut(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
        }
    }
}

/// Retry budget spent; carries the final attempt's error
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: AttemptError<E>,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

impl<E: fmt::Display> From<RetryExhausted<E>> for TrackerError {
    fn from(e: RetryExhausted<E>) -> Self {
        TrackerError::RetryExhausted {
            attempts: e.attempts,
            last_error: e.last_error.to_string(),
        }
    }
}

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single backoff delay
    pub max_delay: Duration,
    /// Bound on each individual attempt
    pub call_timeout: Option<Duration>,
    /// Add up to 10% random delay on top of the backoff
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(60),
            call_timeout: None,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Build from configuration plus the global per-call timeout
    pub fn from_config(config: &RetryConfig, call_timeout: Duration) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            call_timeout: Some(call_timeout),
            jitter: config.jitter,
        }
    }

    /// Set the per-attempt timeout
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Disable jitter (deterministic delays)
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Backoff before retry number `attempt + 1` (`attempt` is zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let base = self.initial_delay.saturating_mul(factor).min(self.max_delay);

        if self.jitter && !base.is_zero() {
            let spread = (base.as_millis() as u64 / 10).max(1);
            let extra = rand::thread_rng().gen_range(0..=spread);
            base + Duration::from_millis(extra)
        } else {
            base
        }
    }

    /// Run `operation` until it succeeds or the attempt budget is spent
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let outcome = match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result.map_err(AttemptError::Failed),
                    Err(_) => Err(AttemptError::TimedOut(limit)),
                },
                None => operation().await.map_err(AttemptError::Failed),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= max_attempts {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.delay_for(attempt - 1);
            tracing::debug!(
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Operation failed, retrying with backoff"
            );
            sleep(delay).await;
        }
    }
}
