//! Client for the provider's JSON directory-listing endpoint.
//!
//! Request: `GET <api_base>/share/list?app_id=..&jsToken=..&shorturl=<key>`
//! plus `root=1` or `dir=<path>`. Response envelope: `errno` (0 = success)
//! and `list`, an array of entries. `errno` is checked before `list` is
//! touched; a failure status usually means the long-lived credential expired.

mod types;

pub use types::{FileDescriptor, LinkRewrite, ListingEntry, PLACEHOLDER_NAME, human_size};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::fetch::Fetcher;
use crate::link::ROOT_PATH;
use crate::resolver::ResolveError;
use types::RawListItem;

/// Default host serving the listing endpoint.
pub const DEFAULT_API_BASE: &str = "https://www.terabox.com";

/// Application identifier the web client sends.
pub const DEFAULT_APP_ID: &str = "250528";

const LIST_PATH: &str = "/share/list";

/// Lists share directories through a [`Fetcher`].
#[derive(Clone)]
pub struct ListingClient {
    fetcher: Arc<dyn Fetcher>,
    api_base: String,
    app_id: String,
}

impl std::fmt::Debug for ListingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingClient")
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl ListingClient {
    /// Creates a client against [`DEFAULT_API_BASE`] with [`DEFAULT_APP_ID`].
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_endpoint(fetcher, DEFAULT_API_BASE, DEFAULT_APP_ID)
    }

    /// Creates a client with a custom endpoint base and app id (for tests and mirrors).
    #[must_use]
    pub fn with_endpoint(
        fetcher: Arc<dyn Fetcher>,
        api_base: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
        }
    }

    /// Lists the root of share `key`.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub async fn list_root(&self, key: &str, token: &str) -> Result<Vec<ListingEntry>, ResolveError> {
        self.list(key, ROOT_PATH, token).await
    }

    /// Lists directory `path` of share `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::FetchFailure`] when the endpoint cannot be
    /// fetched and [`ResolveError::RemoteApiFailure`] when it reports a
    /// non-success status.
    #[instrument(skip(self, token), fields(key = %key, path = %path))]
    pub async fn list(
        &self,
        key: &str,
        path: &str,
        token: &str,
    ) -> Result<Vec<ListingEntry>, ResolveError> {
        let url = self.list_url(key, path, token)?;
        let response = self.fetcher.fetch_json(url.as_str()).await?;
        let entries = parse_listing(&response, path)?;
        debug!(entries = entries.len(), "listed directory");
        Ok(entries)
    }

    fn list_url(&self, key: &str, path: &str, token: &str) -> Result<Url, ResolveError> {
        let mut url = Url::parse(&format!("{}{LIST_PATH}", self.api_base)).map_err(|error| {
            ResolveError::remote_api(None, format!("invalid listing endpoint: {error}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("app_id", &self.app_id)
                .append_pair("jsToken", token)
                .append_pair("shorturl", key);
            if is_root(path) {
                query.append_pair("root", "1");
            } else {
                query.append_pair("dir", path);
            }
        }
        Ok(url)
    }
}

fn is_root(path: &str) -> bool {
    path.trim().trim_end_matches('/').is_empty()
}

/// Parses a listing response envelope into entries.
///
/// Items that are not objects, or whose fields cannot be read at all, are
/// skipped with a warning.
///
/// # Errors
///
/// Returns [`ResolveError::RemoteApiFailure`] when `errno` is missing or non-zero.
pub fn parse_listing(response: &Value, parent: &str) -> Result<Vec<ListingEntry>, ResolveError> {
    let errno = response.get("errno").and_then(errno_value);
    match errno {
        Some(0) => {}
        Some(code) => {
            let upstream = response
                .get("errmsg")
                .and_then(Value::as_str)
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or("request rejected");
            return Err(ResolveError::remote_api(
                Some(code),
                format!("{upstream} (errno {code})"),
            ));
        }
        None => {
            return Err(ResolveError::remote_api(
                None,
                "response carries no errno status",
            ));
        }
    }

    let Some(items) = response.get("list").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            warn!(index, "skipping non-object listing item");
            continue;
        }
        match serde_json::from_value::<RawListItem>(item.clone()) {
            Ok(raw) => entries.push(raw.into_entry(parent)),
            Err(error) => warn!(index, error = %error, "skipping unreadable listing item"),
        }
    }
    Ok(entries)
}

fn errno_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
