//! HTTP fetch layer: bounded-retry GET returning text or JSON.
//!
//! # Architecture
//!
//! - [`Fetcher`] - Async trait the rest of the engine talks to
//! - [`HttpFetcher`] - `reqwest` implementation with per-request credential cookie
//! - [`RetryPolicy`] / [`retry_fetch`] - Fixed-backoff retry loop
//! - [`FetchError`] - Failure carrying URL, attempt count and transient/permanent kind

mod client;
mod error;
mod retry;
#[cfg(test)]
pub(crate) mod scripted;

pub use client::{
    CONNECT_TIMEOUT_SECS, ClientBuildError, FetchSettings, HttpFetcher, READ_TIMEOUT_SECS,
    build_http_client,
};
pub use error::{FetchError, FetchErrorKind, is_transient_status};
pub(crate) use retry::without_query;
pub use retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy, retry_fetch};

use async_trait::async_trait;

/// A fetched text body together with the URL reached after redirects.
///
/// Client-error pages (4xx other than 408/429) are returned rather than
/// failed, since a landing page only needs its redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Response body decoded as text.
    pub body: String,
    /// URL after following HTTP redirects.
    pub final_url: String,
    /// HTTP status of the final response.
    pub status: u16,
}

impl FetchedPage {
    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of remote documents for the resolution engine.
///
/// Implementations own their retry behavior; callers treat any returned
/// error as final for that call.
///
/// # Object Safety
///
/// Uses `async_trait` so the engine can hold an `Arc<dyn Fetcher>` and tests
/// can substitute scripted fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` as text, following redirects.
    ///
    /// Only transport failures and transient statuses are errors.
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Fetches `url` and parses the body as JSON.
    ///
    /// A client-error response whose body is a JSON envelope carrying
    /// `errno` is returned as the body, so the caller sees the upstream status.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError>;
}
