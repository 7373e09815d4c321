//! Error types for share-link resolution.
//!
//! Every failure the engine can produce is a variant of [`ResolveError`],
//! following the What/Suggestion message pattern used across the project.

use thiserror::Error;

use crate::fetch::{FetchError, without_query};

/// Errors that can occur while resolving a share link.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Input does not match any accepted share-link shape.
    #[error("invalid share link '{input}': {reason}\n  Suggestion: {suggestion}")]
    InvalidLinkFormat {
        /// The rejected input
        input: String,
        /// Why the input was rejected
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Network or transport failure after the fetch layer gave up.
    #[error("failed to fetch {url} after {attempts} attempt(s): {reason}\n  Suggestion: Send the link again later")]
    FetchFailure {
        /// The URL that could not be fetched
        url: String,
        /// Number of attempts made
        attempts: u32,
        /// Last failure observed
        reason: String,
    },

    /// The share page did not yield a session token.
    #[error(
        "session token not found in share page ({scripts_scanned} script block(s) scanned, {page_len} bytes)\n  Suggestion: The share key may be invalid or the page format changed"
    )]
    TokenNotFound {
        /// Number of inline script blocks inspected
        scripts_scanned: usize,
        /// Size of the page body in bytes
        page_len: usize,
    },

    /// The listing endpoint returned a non-success status or unusable entries.
    #[error("listing API failure: {message}\n  Suggestion: Check or refresh the long-lived credential")]
    RemoteApiFailure {
        /// Upstream status code, when one was returned
        errno: Option<i64>,
        /// Upstream or local description of the failure
        message: String,
    },

    /// Traversal completed but produced no downloadable file.
    #[error("no files found in share '{key}'\n  Suggestion: The share may be empty or contain only empty folders")]
    NoFilesFound {
        /// The share key that was traversed
        key: String,
    },

    /// The folder tree exceeded a crawl safety bound.
    #[error("folder crawl stopped at '{path}': {limit} limit of {max} exceeded\n  Suggestion: Resolve a sub-folder link instead of the whole share")]
    CrawlLimitExceeded {
        /// Directory being expanded when the bound was hit
        path: String,
        /// Which bound was exceeded ("depth" or "directory")
        limit: &'static str,
        /// Configured bound value
        max: usize,
    },

    /// The overall resolution deadline expired.
    #[error("resolution of '{input}' exceeded the {secs}s deadline\n  Suggestion: Send the link again later")]
    DeadlineExceeded {
        /// The input being resolved
        input: String,
        /// Configured deadline in seconds
        secs: u64,
    },
}

impl ResolveError {
    /// Creates an `InvalidLinkFormat` error.
    #[must_use]
    pub fn invalid_link(input: &str, reason: &str) -> Self {
        Self::InvalidLinkFormat {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Send a share link of the form https://terabox.com/s/<key>".to_string(),
        }
    }

    /// Creates a `TokenNotFound` error.
    #[must_use]
    pub fn token_not_found(scripts_scanned: usize, page_len: usize) -> Self {
        Self::TokenNotFound {
            scripts_scanned,
            page_len,
        }
    }

    /// Creates a `RemoteApiFailure` error.
    #[must_use]
    pub fn remote_api(errno: Option<i64>, message: impl Into<String>) -> Self {
        Self::RemoteApiFailure {
            errno,
            message: message.into(),
        }
    }

    /// Creates a `NoFilesFound` error.
    #[must_use]
    pub fn no_files(key: &str) -> Self {
        Self::NoFilesFound {
            key: key.to_string(),
        }
    }

    /// Creates a `CrawlLimitExceeded` error.
    #[must_use]
    pub fn crawl_limit(path: &str, limit: &'static str, max: usize) -> Self {
        Self::CrawlLimitExceeded {
            path: path.to_string(),
            limit,
            max,
        }
    }

    /// Creates a `DeadlineExceeded` error.
    #[must_use]
    pub fn deadline(input: &str, secs: u64) -> Self {
        Self::DeadlineExceeded {
            input: input.to_string(),
            secs,
        }
    }

    /// Returns true when sending the same link again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailure { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// Stable short label for the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidLinkFormat { .. } => "invalid_link_format",
            Self::FetchFailure { .. } => "fetch_failure",
            Self::TokenNotFound { .. } => "token_not_found",
            Self::RemoteApiFailure { .. } => "remote_api_failure",
            Self::NoFilesFound { .. } => "no_files_found",
            Self::CrawlLimitExceeded { .. } => "crawl_limit_exceeded",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}

impl From<FetchError> for ResolveError {
    fn from(error: FetchError) -> Self {
        Self::FetchFailure {
            url: without_query(&error.url).to_string(),
            attempts: error.attempts,
            reason: error.reason,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchErrorKind;

    #[test]
    fn test_invalid_link_message_contains_input_and_suggestion() {
        let err = ResolveError::invalid_link("https://example.com/x", "unsupported domain");
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/x"));
        assert!(msg.contains("unsupported domain"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_remote_api_message_hints_credential_refresh() {
        let err = ResolveError::remote_api(Some(-6), "need verify");
        let msg = err.to_string();
        assert!(msg.contains("need verify"));
        assert!(msg.contains("credential"));
    }

    #[test]
    fn test_token_not_found_is_distinct_from_credential_hint() {
        let msg = ResolveError::token_not_found(3, 2048).to_string();
        assert!(msg.contains("3 script block(s)"));
        assert!(!msg.contains("credential"));
    }

    #[test]
    fn test_fetch_error_converts_to_fetch_failure() {
        let fetch = FetchError::new("https://terabox.com/s/1x", 5, "timeout", FetchErrorKind::Transient);
        let err = ResolveError::from(fetch);
        assert!(matches!(err, ResolveError::FetchFailure { attempts: 5, .. }));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "fetch_failure");
    }

    #[test]
    fn test_fetch_failure_drops_listing_query() {
        let fetch = FetchError::permanent("https://api.test/share/list?jsToken=T0K&dir=%2Fa", "HTTP 404");
        let err = ResolveError::from(fetch);
        assert!(matches!(err, ResolveError::FetchFailure { ref url, .. } if url == "https://api.test/share/list"));
        assert!(!err.to_string().contains("T0K"));
    }

    #[test]
    fn test_only_transport_failures_are_retryable() {
        assert!(!ResolveError::no_files("abc").is_retryable());
        assert!(!ResolveError::remote_api(None, "x").is_retryable());
        assert!(ResolveError::deadline("link", 30).is_retryable());
    }
}
