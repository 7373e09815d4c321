//! `reqwest`-backed [`Fetcher`] implementation.
//!
//! One [`reqwest::Client`] is built per fetcher and reused for every call,
//! so connection pooling spans all steps of a resolution (and all
//! resolutions sharing the fetcher). The credential cookie is attached per
//! request from the [`CredentialStore`], never baked into the client.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy, RequestBuilder};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::retry::{RetryPolicy, retry_fetch, without_query};
use super::{FetchError, FetchedPage, Fetcher, is_transient_status};
use crate::credential::CredentialStore;
use crate::user_agent::DEFAULT_USER_AGENT;

/// Default connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default read timeout in seconds.
pub const READ_TIMEOUT_SECS: u64 = 30;

const MAX_REDIRECTS: usize = 10;

/// Network settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Retry policy applied to every fetch.
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Failure to construct the underlying HTTP client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// System proxy lookup panicked in both the default and fallback builders.
    #[error("HTTP client construction panicked while initializing networking")]
    Panic,
    /// `reqwest` rejected the configuration.
    #[error("HTTP client construction failed: {0}")]
    Build(#[source] reqwest::Error),
}

/// Fetcher issuing real HTTP requests with bounded retry.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    credential: CredentialStore,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("credential", &self.credential)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    /// Creates a fetcher using `settings` and the shared `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when client construction fails.
    pub fn new(
        settings: &FetchSettings,
        credential: CredentialStore,
    ) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(settings)?,
            credential,
            retry: settings.retry.clone(),
        })
    }

    /// Returns the credential handle used by this fetcher.
    #[must_use]
    pub fn credential(&self) -> &CredentialStore {
        &self.credential
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(cookie) = self.credential.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        request
    }

    async fn fetch_text_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .request(url)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|error| FetchError::from_reqwest(url, &error))?;

        let status = response.status().as_u16();
        if is_transient_status(status) {
            return Err(FetchError::from_status(url, status));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|error| FetchError::transient(url, format!("unreadable body: {error}")))?;

        if !(200..300).contains(&status) {
            debug!(status, final_url = %without_query(&final_url), "keeping client-error page");
        }
        Ok(FetchedPage {
            body,
            final_url,
            status,
        })
    }

    async fn fetch_json_once(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let response = self
            .request(url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .send()
            .await
            .map_err(|error| FetchError::from_reqwest(url, &error))?;

        let status = response.status();
        if is_transient_status(status.as_u16()) {
            return Err(FetchError::from_status(url, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|error| FetchError::transient(url, format!("unreadable body: {error}")))?;

        if !status.is_success() {
            return api_envelope(&body)
                .ok_or_else(|| FetchError::from_status(url, status.as_u16()));
        }

        serde_json::from_str(&body)
            .map_err(|error| FetchError::permanent(url, format!("malformed JSON: {error}")))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let page = retry_fetch(&self.retry, url, |_| self.fetch_text_once(url)).await?;
        debug!(final_url = %page.final_url, bytes = page.body.len(), "fetched page");
        Ok(page)
    }

    #[instrument(skip(self, url), fields(endpoint = %without_query(url)))]
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        retry_fetch(&self.retry, url, |_| self.fetch_json_once(url)).await
    }
}

/// A JSON object carrying `errno`, as the listing API answers rejected calls.
fn api_envelope(body: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .filter(|value| value.get("errno").is_some())
}

/// Builds the shared HTTP client.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when construction fails in both the default
/// builder and the env-proxy fallback builder.
pub fn build_http_client(settings: &FetchSettings) -> Result<Client, ClientBuildError> {
    match try_build_client(settings, false) {
        Err(ClientBuildError::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; the fallback keeps env-proxy support without that lookup.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            try_build_client(settings, true)
        }
        other => other,
    }
}

fn try_build_client(
    settings: &FetchSettings,
    disable_system_proxy_lookup: bool,
) -> Result<Client, ClientBuildError> {
    catch_unwind(AssertUnwindSafe(|| {
        let mut builder = base_builder(settings);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(ClientBuildError::Build)
    }))
    .map_err(|_| ClientBuildError::Panic)?
}

fn base_builder(settings: &FetchSettings) -> ClientBuilder {
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.read_timeout)
        .user_agent(settings.user_agent.clone())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
