//! Error type for the fetch layer.

use thiserror::Error;

use super::without_query;

/// Whether a failed fetch attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connection errors, timeouts, unreadable bodies, 408/429/5xx responses.
    Transient,
    /// Invalid URLs, other 4xx responses, malformed JSON.
    Permanent,
}

/// A fetch that failed, either permanently or after exhausting its attempts.
#[derive(Debug, Clone, Error)]
#[error("fetching {} failed after {attempts} attempt(s): {reason}", without_query(.url))]
pub struct FetchError {
    /// The requested URL; its query is left out of the message.
    pub url: String,
    /// Number of attempts made before giving up.
    pub attempts: u32,
    /// Description of the last failure.
    pub reason: String,
    /// Classification of the last failure.
    pub kind: FetchErrorKind,
}

impl FetchError {
    /// Creates a fetch error.
    pub fn new(
        url: impl Into<String>,
        attempts: u32,
        reason: impl Into<String>,
        kind: FetchErrorKind,
    ) -> Self {
        Self {
            url: url.into(),
            attempts,
            reason: reason.into(),
            kind,
        }
    }

    /// Creates a transient failure for a single attempt.
    pub fn transient(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(url, 1, reason, FetchErrorKind::Transient)
    }

    /// Creates a permanent failure for a single attempt.
    pub fn permanent(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(url, 1, reason, FetchErrorKind::Permanent)
    }

    /// Returns true if the failure may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }

    /// Builds the error for a `reqwest` failure, classifying it.
    pub(crate) fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::permanent(url, format!("invalid request: {error}"));
        }
        if error.is_timeout() {
            return Self::transient(url, "request timed out");
        }
        if let Some(status) = error.status() {
            return Self::from_status(url, status.as_u16());
        }
        Self::transient(url, error.to_string())
    }

    /// Builds the error for a non-success HTTP status, classifying it.
    pub(crate) fn from_status(url: &str, status: u16) -> Self {
        let reason = format!("HTTP {status}");
        if is_transient_status(status) {
            Self::transient(url, reason)
        } else {
            Self::permanent(url, reason)
        }
    }
}

/// 408, 429 and every 5xx are retried; other statuses are final.
#[must_use]
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}
