//! In-memory [`Fetcher`] for unit tests.
//!
//! Text pages are keyed by exact URL. Listing responses are keyed by the
//! directory they answer for: `/` when the request carries `root=1`,
//! otherwise the decoded `dir` parameter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{FetchError, FetchedPage, Fetcher};

#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    pages: HashMap<String, FetchedPage>,
    listings: HashMap<String, Value>,
    json_calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(self, url: &str, body: &str, final_url: &str) -> Self {
        self.with_page_status(url, 200, body, final_url)
    }

    pub(crate) fn with_page_status(
        mut self,
        url: &str,
        status: u16,
        body: &str,
        final_url: &str,
    ) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                body: body.to_string(),
                final_url: final_url.to_string(),
                status,
            },
        );
        self
    }

    pub(crate) fn with_listing(mut self, dir: &str, response: Value) -> Self {
        self.listings.insert(dir.to_string(), response);
        self
    }

    /// Directories requested from the listing endpoint, in call order.
    pub(crate) fn listed_dirs(&self) -> Vec<String> {
        self.json_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

fn listing_dir(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let mut dir = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "root" if value == "1" => return Some("/".to_string()),
            "dir" => dir = Some(value.into_owned()),
            _ => {}
        }
    }
    dir
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::permanent(url, "HTTP 404 Not Found"))
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let dir = listing_dir(url).ok_or_else(|| FetchError::permanent(url, "not a listing URL"))?;
        if let Ok(mut calls) = self.json_calls.lock() {
            calls.push(dir.clone());
        }
        self.listings
            .get(&dir)
            .cloned()
            .ok_or_else(|| FetchError::permanent(url, "HTTP 404 Not Found"))
    }
}
