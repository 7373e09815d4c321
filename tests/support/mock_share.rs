//! A mock share provider on a local `MockServer`.
//!
//! Share links must use an allow-listed domain, so [`LocalRouting`] wraps the
//! real [`HttpFetcher`] and sends requests for those hosts to the mock server
//! instead. Everything else (redirects, retries, cookies) runs for real.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use teralink_core::fetch::{FetchError, FetchSettings, FetchedPage, Fetcher, HttpFetcher, RetryPolicy};
use teralink_core::link::is_accepted_host;
use teralink_core::{CredentialStore, ResolverSettings};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

pub const TOKEN: &str = "TOKEN42";

/// Fetcher that serves allow-listed hosts from the mock server.
pub struct LocalRouting {
    inner: HttpFetcher,
    base: Url,
}

impl LocalRouting {
    pub fn new(inner: HttpFetcher, server: &MockServer) -> Self {
        Self {
            inner,
            base: Url::parse(&server.uri()).unwrap(),
        }
    }

    fn route(&self, url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };
        if parsed.host_str().is_some_and(is_accepted_host) {
            parsed.set_scheme(self.base.scheme()).unwrap();
            parsed.set_host(self.base.host_str()).unwrap();
            parsed.set_port(self.base.port()).unwrap();
        }
        parsed.to_string()
    }
}

#[async_trait]
impl Fetcher for LocalRouting {
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.inner.fetch_text(&self.route(url)).await
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        self.inner.fetch_json(&self.route(url)).await
    }
}

/// Fetch settings with no backoff so retry tests run instantly.
pub fn fast_settings(max_attempts: u32) -> FetchSettings {
    FetchSettings {
        retry: RetryPolicy::new(max_attempts, Duration::ZERO),
        ..FetchSettings::default()
    }
}

pub fn http_fetcher(max_attempts: u32, credential: &CredentialStore) -> HttpFetcher {
    HttpFetcher::new(&fast_settings(max_attempts), credential.clone()).unwrap()
}

pub fn routed(server: &MockServer, credential: &CredentialStore) -> Arc<dyn Fetcher> {
    Arc::new(LocalRouting::new(http_fetcher(5, credential), server))
}

pub fn resolver_settings(server: &MockServer) -> ResolverSettings {
    ResolverSettings {
        page_base: server.uri(),
        api_base: server.uri(),
        ..ResolverSettings::default()
    }
}

/// Mounts the landing redirect and token page for share `1<key>`.
pub async fn mount_share_pages(server: &MockServer, key: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/s/1{key}")))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("/sharing/link?surl={key}").as_str()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sharing/link"))
        .and(query_param("surl", key))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>share landing</html>"))
        .mount(server)
        .await;

    let token_page = format!(
        "<html><head><script>var cfg = {{}};</script>\
         <script>try {{eval(decodeURIComponent(%22{TOKEN}%22%29%29)}} catch(e) {{}}</script>\
         </head></html>"
    );
    Mock::given(method("GET"))
        .and(path("/wap/share/filelist"))
        .and(query_param("surl", key))
        .respond_with(ResponseTemplate::new(200).set_body_string(token_page))
        .mount(server)
        .await;
}

/// Mounts a listing response for `dir` (`/` means the root request).
pub async fn mount_listing(server: &MockServer, dir: &str, body: Value) {
    let mock = Mock::given(method("GET"))
        .and(path("/share/list"))
        .and(query_param("jsToken", TOKEN));
    let mock = if dir == "/" {
        mock.and(query_param("root", "1"))
    } else {
        mock.and(query_param("dir", dir))
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn file_entry(path: &str, size: u64) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({
        "isdir": "0",
        "server_filename": name,
        "size": size,
        "path": path,
        "dlink": format!("https://d.terabox.com/file/{name}?sign=abc"),
        "thumbs": {"url3": format!("https://thumb.terabox.com/{name}.jpg")},
    })
}

pub fn dir_entry(path: &str) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({"isdir": "1", "server_filename": name, "path": path})
}

/// Responder that fails the first `fail_count` requests with 500, then returns 200 with body.
pub struct FlakyResponder {
    pub request_count: Arc<AtomicUsize>,
    pub fail_count: usize,
    pub success_body: String,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_string("internal server error")
        } else {
            ResponseTemplate::new(200).set_body_string(self.success_body.clone())
        }
    }
}
