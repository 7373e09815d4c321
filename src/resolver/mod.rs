//! Resolution facade: turns one share link into a list of downloadable files.
//!
//! # Architecture
//!
//! - [`ShareResolver`] - Orchestrates normalize, fetch, token, listing and crawl
//! - [`ResolverSettings`] - Endpoints, link rewrite, crawl bounds, deadline
//! - [`Resolution`] - Non-empty result for one input link
//! - [`ResolveError`] - Every typed failure the engine can produce
//!
//! # Sequence
//!
//! 1. Normalize the link (allow-listed domain, accepted shape)
//! 2. Fetch the canonical URL, keeping the URL reached after redirects
//! 3. Recover key and path from that URL
//! 4. Fetch the share's listing page and extract the session token
//! 5. List the share; a lone file at the top level is returned as is,
//!    anything else is crawled
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use teralink_core::credential::CredentialStore;
//! use teralink_core::fetch::{FetchSettings, HttpFetcher};
//! use teralink_core::resolver::{ResolverSettings, ShareResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(&FetchSettings::default(), CredentialStore::from_env())?;
//! let resolver = ShareResolver::new(Arc::new(fetcher), ResolverSettings::default());
//!
//! let resolution = resolver.resolve("https://terabox.com/s/1AbC").await?;
//! for file in &resolution.files {
//!     println!("{} ({}): {}", file.display_name, file.human_size, file.download_link);
//! }
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::ResolveError;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, instrument};
use url::Url;

use crate::crawl::{CrawlLimits, FolderCrawler};
use crate::fetch::{FetchError, Fetcher};
use crate::link::{ShareReference, extract_key_and_path, extract_share_links, normalize};
use crate::listing::{DEFAULT_API_BASE, DEFAULT_APP_ID, FileDescriptor, LinkRewrite, ListingClient};
use crate::token::{ScriptTokenExtractor, SessionToken, TokenExtractor};

/// Default host serving share pages.
pub const DEFAULT_PAGE_BASE: &str = "https://www.terabox.com";

const LISTING_PAGE_PATH: &str = "/wap/share/filelist";

/// Endpoint and behavior settings for a [`ShareResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Base URL of the share web pages (token source).
    pub page_base: String,
    /// Base URL of the listing API.
    pub api_base: String,
    /// Application id sent to the listing API.
    pub app_id: String,
    /// Host rewrite applied to every download link.
    pub rewrite: LinkRewrite,
    /// Crawl safety bounds.
    pub limits: CrawlLimits,
    /// Overall deadline for one resolution; `None` for unbounded.
    pub deadline: Option<Duration>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            page_base: DEFAULT_PAGE_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            rewrite: LinkRewrite::default(),
            limits: CrawlLimits::default(),
            deadline: None,
        }
    }
}

/// The files one share link resolved to; `files` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical form of the input link.
    pub source: String,
    /// Share key and path the files were listed from.
    pub share: ShareReference,
    /// Downloadable files in traversal order.
    pub files: Vec<FileDescriptor>,
}

/// Resolves share links into downloadable file descriptors.
///
/// Holds no per-resolution state; one instance serves concurrent resolutions.
pub struct ShareResolver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Box<dyn TokenExtractor>,
    crawler: FolderCrawler,
    settings: ResolverSettings,
}

impl std::fmt::Debug for ShareResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareResolver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ShareResolver {
    /// Creates a resolver with the default script-based token extractor.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: ResolverSettings) -> Self {
        let listing = ListingClient::with_endpoint(
            Arc::clone(&fetcher),
            settings.api_base.clone(),
            settings.app_id.clone(),
        );
        let crawler = FolderCrawler::new(listing, settings.rewrite.clone(), settings.limits);
        Self {
            fetcher,
            extractor: Box::new(ScriptTokenExtractor::default()),
            crawler,
            settings,
        }
    }

    /// Replaces the token-extraction heuristic.
    #[must_use]
    pub fn with_token_extractor(mut self, extractor: impl TokenExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Settings this resolver was built with.
    #[must_use]
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolves one share link.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolveError`] hit along the sequence, or
    /// [`ResolveError::DeadlineExceeded`] when a deadline is configured and
    /// expires first.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution, ResolveError> {
        match self.settings.deadline {
            Some(limit) => tokio::time::timeout(limit, self.resolve_unbounded(raw))
                .await
                .map_err(|_| ResolveError::deadline(raw.trim(), limit.as_secs()))?,
            None => self.resolve_unbounded(raw).await,
        }
    }

    /// Resolves every share link found in `text`, concurrently.
    ///
    /// Returns one `(link, outcome)` pair per discovered link, in order of
    /// appearance. Text without links yields an empty vector.
    pub async fn resolve_text(&self, text: &str) -> Vec<(String, Result<Resolution, ResolveError>)> {
        let links = extract_share_links(text);
        debug!(links = links.len(), "discovered share links");
        join_all(links.into_iter().map(|link| async move {
            let outcome = self.resolve(&link).await;
            (link, outcome)
        }))
        .await
    }

    #[instrument(skip(self, raw), fields(link = %raw.trim()))]
    async fn resolve_unbounded(&self, raw: &str) -> Result<Resolution, ResolveError> {
        let link = normalize(raw)?;
        let landing = self.fetcher.fetch_text(link.url.as_str()).await?;
        if !landing.is_success() {
            debug!(status = landing.status, "landing page returned a client error, using its URL");
        }

        let share = match extract_key_and_path(&landing.final_url) {
            Ok(share) => share,
            Err(error) => {
                debug!(final_url = %landing.final_url, %error, "redirect carried no key, using link key");
                link.share.clone()
            }
        };
        debug!(key = %share.key, path = %share.path, "share reference recovered");

        let token = self.session_token(&share).await?;
        let listing = self.crawler.listing();
        let entries = listing.list(&share.key, &share.path, &token.value).await?;

        let files = match entries.as_slice() {
            [single] if !single.is_directory => {
                debug!("single-file share");
                vec![FileDescriptor::from_entry(single, &self.settings.rewrite)?]
            }
            _ => {
                self.crawler
                    .crawl_entries(&share.key, &token.value, &share.path, entries)
                    .await?
            }
        };

        if files.is_empty() {
            return Err(ResolveError::no_files(&share.key));
        }

        info!(key = %share.key, files = files.len(), "share resolved");
        Ok(Resolution {
            source: link.url.to_string(),
            share,
            files,
        })
    }

    async fn session_token(&self, share: &ShareReference) -> Result<SessionToken, ResolveError> {
        let url = self.listing_page_url(&share.key)?;
        let page = self.fetcher.fetch_text(url.as_str()).await?;
        let value = match self.extractor.extract(&page.body) {
            Ok(value) => value,
            Err(_) if !page.is_success() => {
                return Err(FetchError::from_status(url.as_str(), page.status).into());
            }
            Err(error) => return Err(error),
        };
        Ok(SessionToken {
            value,
            share: share.clone(),
        })
    }

    fn listing_page_url(&self, key: &str) -> Result<Url, ResolveError> {
        let base = self.settings.page_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{LISTING_PAGE_PATH}")).map_err(|error| {
            ResolveError::invalid_link(base, &format!("invalid share page base ({error})"))
        })?;
        url.query_pairs_mut().append_pair("surl", key);
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::fetch::FetchedPage;
    use crate::fetch::scripted::ScriptedFetcher;

    const LINK: &str = "https://terabox.com/s/1AbC";
    const TOKEN_PAGE: &str = "https://page.test/wap/share/filelist?surl=AbC";
    const LOADER_PAGE: &str = "<html><script>try {eval(decodeURIComponent(%22TOKEN42%22%29%29)}</script></html>";

    fn settings() -> ResolverSettings {
        ResolverSettings {
            page_base: "https://page.test".to_string(),
            api_base: "https://api.test".to_string(),
            ..ResolverSettings::default()
        }
    }

    fn scripted() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .with_page(LINK, "<html>landing</html>", "https://www.terabox.com/sharing/link?surl=AbC")
            .with_page(TOKEN_PAGE, LOADER_PAGE, TOKEN_PAGE)
    }

    fn resolver(fetcher: &Arc<ScriptedFetcher>) -> ShareResolver {
        let fetcher: Arc<dyn Fetcher> = fetcher.clone();
        ShareResolver::new(fetcher, settings())
    }

    fn file(name: &str, size: u64) -> Value {
        json!({
            "isdir": "0",
            "server_filename": name,
            "size": size,
            "dlink": format!("http://d.terabox.com/{name}"),
            "path": format!("/{name}"),
        })
    }

    #[tokio::test]
    async fn test_single_file_share_resolves_without_crawl() {
        let fetcher = Arc::new(scripted().with_listing(
            "/",
            json!({"errno": 0, "list": [{"isdir": "0", "server_filename": "movie.mp4", "size": 104_857_600, "dlink": "http://d.terabox.com/x"}]}),
        ));
        let resolution = resolver(&fetcher).resolve(LINK).await.unwrap();

        assert_eq!(resolution.files.len(), 1);
        let movie = &resolution.files[0];
        assert_eq!(movie.display_name, "movie.mp4");
        assert_eq!(movie.human_size, "100.00 MB");
        assert_eq!(movie.download_link, "http://d.terabox.app/x");
        assert_eq!(resolution.share.key, "AbC");
        assert_eq!(resolution.source, LINK);
        assert_eq!(fetcher.listed_dirs(), ["/"]);
    }

    #[tokio::test]
    async fn test_folder_share_keeps_root_files_and_crawls_dirs() {
        let fetcher = Arc::new(
            scripted()
                .with_listing(
                    "/",
                    json!({"errno": 0, "list": [file("a.txt", 10), {"isdir": "1", "path": "/sub", "server_filename": "sub"}]}),
                )
                .with_listing("/sub", json!({"errno": 0, "list": [file("b.txt", 20)]})),
        );
        let resolution = resolver(&fetcher).resolve(LINK).await.unwrap();
        let names: Vec<_> = resolution.files.iter().map(|f| f.display_name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_root_listed_as_its_own_child_is_not_expanded_again() {
        let fetcher = Arc::new(scripted().with_listing(
            "/",
            json!({"errno": 0, "list": [file("a", 1), {"isdir": "1", "path": "/", "server_filename": "share"}]}),
        ));
        let resolution = resolver(&fetcher).resolve(LINK).await.unwrap();
        let names: Vec<_> = resolution.files.iter().map(|f| f.display_name.as_str()).collect();
        assert_eq!(names, ["a"]);
        assert_eq!(fetcher.listed_dirs(), ["/"]);
    }

    #[tokio::test]
    async fn test_client_error_landing_page_still_yields_key() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_page_status(LINK, 404, "<html>gone</html>", "https://www.terabox.com/sharing/link?surl=AbC")
                .with_page(TOKEN_PAGE, LOADER_PAGE, TOKEN_PAGE)
                .with_listing("/", json!({"errno": 0, "list": [file("a.bin", 1)]})),
        );
        let resolution = resolver(&fetcher).resolve(LINK).await.unwrap();
        assert_eq!(resolution.share.key, "AbC");
    }

    #[tokio::test]
    async fn test_client_error_token_page_is_fetch_failure() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_page(LINK, "", "https://www.terabox.com/sharing/link?surl=AbC")
                .with_page_status(TOKEN_PAGE, 403, "<html>forbidden</html>", TOKEN_PAGE),
        );
        let err = resolver(&fetcher).resolve(LINK).await.unwrap_err();
        assert!(matches!(err, ResolveError::FetchFailure { ref reason, .. } if reason == "HTTP 403"));
        assert!(fetcher.listed_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_remote_api_failure_skips_list() {
        let fetcher = Arc::new(
            scripted().with_listing("/", json!({"errno": 400_141, "list": [file("never.txt", 1)]})),
        );
        let err = resolver(&fetcher).resolve(LINK).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::RemoteApiFailure {
                errno: Some(400_141),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_root_is_no_files_found() {
        let fetcher = Arc::new(scripted().with_listing("/", json!({"errno": 0, "list": []})));
        let err = resolver(&fetcher).resolve(LINK).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoFilesFound { ref key } if key == "AbC"));
    }

    #[tokio::test]
    async fn test_only_empty_directories_is_no_files_found() {
        let fetcher = Arc::new(
            scripted()
                .with_listing(
                    "/",
                    json!({"errno": 0, "list": [{"isdir": 1, "path": "/e"}]}),
                )
                .with_listing("/e", json!({"errno": 0, "list": []})),
        );
        let err = resolver(&fetcher).resolve(LINK).await.unwrap_err();
        assert_eq!(err.kind(), "no_files_found");
    }

    #[tokio::test]
    async fn test_invalid_link_fails_before_any_fetch() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let err = resolver(&fetcher).resolve("https://example.com/s/1AbC").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_link_format");
        assert!(fetcher.listed_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_is_token_not_found() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_page(LINK, "", "https://www.terabox.com/sharing/link?surl=AbC")
                .with_page(TOKEN_PAGE, "<html><script>var x;</script></html>", TOKEN_PAGE),
        );
        let err = resolver(&fetcher).resolve(LINK).await.unwrap_err();
        assert_eq!(err.kind(), "token_not_found");
        assert!(fetcher.listed_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_without_key_falls_back_to_link_key() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_page(LINK, "", "https://www.terabox.com/login")
                .with_page(
                    "https://page.test/wap/share/filelist?surl=1AbC",
                    LOADER_PAGE,
                    "https://page.test/wap/share/filelist?surl=1AbC",
                )
                .with_listing("/", json!({"errno": 0, "list": [file("a.bin", 1)]})),
        );
        let resolution = resolver(&fetcher).resolve(LINK).await.unwrap();
        assert_eq!(resolution.share.key, "1AbC");
    }

    #[tokio::test]
    async fn test_resolve_text_reports_each_link_in_order() {
        let fetcher = Arc::new(scripted().with_listing("/", json!({"errno": 0, "list": [file("a.bin", 1)]})));
        let text = format!("first {LINK}, then https://terabox.com/s/1Missing. and https://example.com/s/1x");
        let outcomes = resolver(&fetcher).resolve_text(&text).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, LINK);
        assert!(outcomes[0].1.is_ok());
        assert_eq!(outcomes[1].0, "https://terabox.com/s/1Missing");
        assert_eq!(outcomes[1].1.as_ref().unwrap_err().kind(), "fetch_failure");
    }

    #[tokio::test]
    async fn test_resolve_text_without_links_is_empty() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        assert!(resolver(&fetcher).resolve_text("hello there").await.is_empty());
    }

    struct StalledFetcher;

    #[async_trait]
    impl Fetcher for StalledFetcher {
        async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(FetchError::transient(url, "stalled"))
        }

        async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
            Err(FetchError::transient(url, "stalled"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_slow_resolution() {
        let settings = ResolverSettings {
            deadline: Some(Duration::from_secs(30)),
            ..settings()
        };
        let resolver = ShareResolver::new(Arc::new(StalledFetcher), settings);
        let err = resolver.resolve(LINK).await.unwrap_err();
        assert!(matches!(err, ResolveError::DeadlineExceeded { secs: 30, .. }));
        assert!(err.is_retryable());
    }

    struct FixedToken;

    impl TokenExtractor for FixedToken {
        fn extract(&self, _html: &str) -> Result<String, ResolveError> {
            Ok("fixed".to_string())
        }
    }

    #[tokio::test]
    async fn test_custom_token_extractor_is_used() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .with_page(LINK, "", "https://www.terabox.com/sharing/link?surl=AbC")
                .with_page(TOKEN_PAGE, "no scripts here", TOKEN_PAGE)
                .with_listing("/", json!({"errno": 0, "list": [file("a.bin", 1)]})),
        );
        let dyn_fetcher: Arc<dyn Fetcher> = fetcher.clone();
        let resolver = ShareResolver::new(dyn_fetcher, settings()).with_token_extractor(FixedToken);
        assert_eq!(resolver.resolve(LINK).await.unwrap().files.len(), 1);
    }
}
