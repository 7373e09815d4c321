//! Bounded retry with a fixed backoff for fetch operations.
//!
//! Each fetch gets at most [`RetryPolicy::max_attempts`] attempts. A
//! transient failure sleeps the fixed backoff and tries again; a permanent
//! failure (see [`FetchErrorKind`]) stops immediately.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use teralink_core::fetch::{FetchErrorKind, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(5, Duration::from_secs(1));
//! assert!(matches!(
//!     policy.should_retry(FetchErrorKind::Transient, 1),
//!     RetryDecision::Retry { attempt: 2, .. }
//! ));
//! assert!(matches!(
//!     policy.should_retry(FetchErrorKind::Transient, 5),
//!     RetryDecision::DoNotRetry { .. }
//! ));
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::{FetchError, FetchErrorKind};

/// Default maximum attempts per fetch, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default fixed delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Decision on whether to repeat a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt this will be (1-indexed, so the first retry is attempt 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Fixed-backoff retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed delay between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, kind: FetchErrorKind, attempt: u32) -> RetryDecision {
        if kind == FetchErrorKind::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.backoff,
            attempt: attempt + 1,
        }
    }
}

/// Runs `operation` under `policy`, returning the first success.
///
/// `operation` receives the 1-indexed attempt number. The returned error
/// carries the number of attempts actually made.
///
/// # Errors
///
/// Returns the last [`FetchError`] once the policy stops retrying.
pub async fn retry_fetch<T, F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let endpoint = without_query(url);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(endpoint, attempt, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => match policy.should_retry(error.kind, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        endpoint,
                        attempt,
                        next_attempt = next,
                        delay_ms = delay.as_millis(),
                        error = %error.reason,
                        "fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(endpoint, attempt, %reason, "giving up on fetch");
                    return Err(FetchError {
                        attempts: attempt,
                        ..error
                    });
                }
            },
        }
    }
}

/// Strips the query string; listing URLs carry the session token there.
pub(crate) fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
