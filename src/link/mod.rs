//! Share-link normalization, key recovery and discovery in free text.
//!
//! Two external shapes are accepted on an allow-listed domain, checked in order:
//!
//! 1. `/s/<key>` - the key is everything after `/s/`
//! 2. `/sharing/link?surl=<key>` - the key is the `surl` query parameter
//!
//! Anything else is [`ResolveError::InvalidLinkFormat`].
//!
//! # Example
//!
//! ```
//! use teralink_core::link::normalize;
//!
//! let link = normalize("https://WWW.TeraBox.com/s/1AbC").unwrap();
//! assert_eq!(link.share.key, "1AbC");
//! assert_eq!(link.url.as_str(), "https://terabox.com/s/1AbC");
//! ```

mod domains;

pub use domains::{ACCEPTED_DOMAINS, is_accepted_host};

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use crate::resolver::ResolveError;
use crate::utils::{canonical_host, compile_static_regex, trim_link_trailing};

/// Directory path used when a link names no sub-directory.
pub const ROOT_PATH: &str = "/";

const SHARE_PATH_PREFIX: &str = "/s/";
const SHARING_LINK_PATH: &str = "/sharing/link";
const SURL_PARAM: &str = "surl";

static SHARE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    let domains = ACCEPTED_DOMAINS
        .iter()
        .map(|domain| regex::escape(domain))
        .collect::<Vec<_>>()
        .join("|");
    compile_static_regex(&format!(
        r#"(?i)https?://(?:www\.)?(?:{domains})(?:/s/[^\s<>"'`]+|/sharing/link\?[^\s<>"'`]*)"#
    ))
});

/// Identifies a shared folder or file: the share key plus a directory path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareReference {
    /// Opaque share identifier; never empty.
    pub key: String,
    /// Directory path inside the share, `/` for the root.
    pub path: String,
}

impl ShareReference {
    /// Creates a reference; an empty path becomes [`ROOT_PATH`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidLinkFormat`] when `key` is empty.
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Result<Self, ResolveError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(ResolveError::invalid_link("", "share key is empty"));
        }
        let path = path.into();
        Ok(Self {
            key,
            path: if path.is_empty() {
                ROOT_PATH.to_string()
            } else {
                path
            },
        })
    }

    /// Creates a reference to the root of share `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidLinkFormat`] when `key` is empty.
    pub fn root(key: impl Into<String>) -> Result<Self, ResolveError> {
        Self::new(key, ROOT_PATH)
    }
}

/// Which accepted external shape a link matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkShape {
    /// `/s/<key>`
    SharePath,
    /// `/sharing/link?surl=<key>`
    SharingQuery,
}

/// A share link reduced to its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    /// Key and path carried by the link.
    pub share: ShareReference,
    /// Canonical URL: https, bare lowercase host, only the key-bearing component.
    pub url: Url,
    /// Shape the input matched.
    pub shape: LinkShape,
}

/// Normalizes an external share link.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidLinkFormat`] when the input is not a URL,
/// uses a non-HTTP scheme, is not on an allow-listed domain, or matches
/// neither accepted shape.
#[tracing::instrument(level = "debug")]
pub fn normalize(raw: &str) -> Result<NormalizedLink, ResolveError> {
    let input = raw.trim();
    let url = Url::parse(input)
        .map_err(|error| ResolveError::invalid_link(input, &format!("not a valid URL ({error})")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ResolveError::invalid_link(
            input,
            &format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let Some(host) = url.host_str().map(canonical_host) else {
        return Err(ResolveError::invalid_link(input, "URL has no host"));
    };
    if !is_accepted_host(&host) {
        return Err(ResolveError::invalid_link(
            input,
            &format!("'{host}' is not a supported share domain"),
        ));
    }

    if let Some(rest) = url.path().strip_prefix(SHARE_PATH_PREFIX) {
        let key = decode_component(rest.trim_end_matches('/'));
        let share = ShareReference::root(key)
            .map_err(|_| ResolveError::invalid_link(input, "share key is empty"))?;
        let canonical = canonical_url(input, &host, |url| {
            url.set_path(&format!("{SHARE_PATH_PREFIX}{}", share.key));
        })?;
        debug!(key = %share.key, "normalized share-path link");
        return Ok(NormalizedLink {
            share,
            url: canonical,
            shape: LinkShape::SharePath,
        });
    }

    if url.path().trim_end_matches('/') == SHARING_LINK_PATH {
        let key = query_value(&url, SURL_PARAM).unwrap_or_default();
        let share = ShareReference::root(key)
            .map_err(|_| ResolveError::invalid_link(input, "missing 'surl' query parameter"))?;
        let canonical = canonical_url(input, &host, |url| {
            url.set_path(SHARING_LINK_PATH);
            url.query_pairs_mut().append_pair(SURL_PARAM, &share.key);
        })?;
        debug!(key = %share.key, "normalized sharing-query link");
        return Ok(NormalizedLink {
            share,
            url: canonical,
            shape: LinkShape::SharingQuery,
        });
    }

    Err(ResolveError::invalid_link(
        input,
        "expected a /s/<key> or /sharing/link?surl=<key> path",
    ))
}

/// Recovers the share key and directory path from a URL reached after redirects.
///
/// Prefers the `surl` query parameter, then a `/s/<key>` path segment. The
/// path comes from the `path` (or `dir`) query parameter, decoded, and
/// defaults to `/`. Any host is accepted, since redirects may land on a
/// different mirror.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidLinkFormat`] when the URL is unparseable
/// or carries no key.
pub fn extract_key_and_path(resolved_url: &str) -> Result<ShareReference, ResolveError> {
    let url = Url::parse(resolved_url.trim()).map_err(|error| {
        ResolveError::invalid_link(resolved_url, &format!("not a valid URL ({error})"))
    })?;

    let key = query_value(&url, SURL_PARAM).or_else(|| {
        url.path()
            .strip_prefix(SHARE_PATH_PREFIX)
            .and_then(|rest| rest.split('/').next())
            .map(decode_component)
            .filter(|key| !key.is_empty())
    });

    let Some(key) = key else {
        return Err(ResolveError::invalid_link(
            resolved_url,
            "no share key in redirected URL",
        ));
    };

    let path = query_value(&url, "path")
        .or_else(|| query_value(&url, "dir"))
        .unwrap_or_else(|| ROOT_PATH.to_string());
    trace!(%key, %path, "extracted key and path");

    ShareReference::new(key, path)
}

/// Finds every allow-listed share link in `text`, in order of appearance.
///
/// Trailing punctuation is stripped; duplicates are preserved.
#[must_use]
pub fn extract_share_links(text: &str) -> Vec<String> {
    SHARE_LINK_RE
        .find_iter(text)
        .map(|found| trim_link_trailing(found.as_str()).to_string())
        .collect()
}

fn canonical_url(
    input: &str,
    host: &str,
    build: impl FnOnce(&mut Url),
) -> Result<Url, ResolveError> {
    let mut url = Url::parse(&format!("https://{host}/"))
        .map_err(|error| ResolveError::invalid_link(input, &format!("invalid host ({error})")))?;
    build(&mut url);
    Ok(url)
}

fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
