//! Session-token extraction from a share's listing page.
//!
//! The provider embeds the short-lived `jsToken` inside an obfuscated
//! bootstrap script: a block starting with `try {eval(decodeURIComponent`
//! whose percent-encoded payload carries the token between the first pair of
//! `%22` (encoded `"`) markers. This is a provider-specific scraping
//! heuristic with no contractual stability; when the page format drifts the
//! extractor reports [`ResolveError::TokenNotFound`] and the heuristic can be
//! swapped through the [`TokenExtractor`] trait without touching the rest of
//! the engine.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::link::ShareReference;
use crate::resolver::ResolveError;
use crate::utils::compile_static_regex;

/// Signature of the obfuscated bootstrap loader.
pub const DEFAULT_PREAMBLE: &str = "try {eval(decodeURIComponent";

/// Percent-encoded quote separating the token from the surrounding payload.
pub const DEFAULT_MARKER: &str = "%22";

static SCRIPT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<script\b[^>]*>(.*?)</script\s*>"));

/// A session token together with the share it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Raw token value sent as `jsToken`.
    pub value: String,
    /// The share reference whose page yielded the token.
    pub share: ShareReference,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("share", &self.share)
            .finish()
    }
}

/// Derives a session token from page HTML.
pub trait TokenExtractor: Send + Sync {
    /// Extracts the token from `html`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TokenNotFound`] when no token can be derived.
    fn extract(&self, html: &str) -> Result<String, ResolveError>;
}

/// Default extractor: scans inline script blocks for the bootstrap loader.
#[derive(Debug, Clone)]
pub struct ScriptTokenExtractor {
    preamble: String,
    marker: String,
}

impl Default for ScriptTokenExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE, DEFAULT_MARKER)
    }
}

impl ScriptTokenExtractor {
    /// Creates an extractor with a custom loader signature and field marker.
    #[must_use]
    pub fn new(preamble: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            marker: marker.into(),
        }
    }
}

impl TokenExtractor for ScriptTokenExtractor {
    fn extract(&self, html: &str) -> Result<String, ResolveError> {
        let mut scanned = 0;
        for caps in SCRIPT_BLOCK_RE.captures_iter(html) {
            scanned += 1;
            let Some(block) = caps.get(1).map(|m| m.as_str().trim_start()) else {
                continue;
            };
            if !block.starts_with(&self.preamble) || !block.contains(&self.marker) {
                continue;
            }

            trace!(block = scanned, "found bootstrap loader script");
            // First qualifying block decides; later blocks are not consulted.
            return match block.split(self.marker.as_str()).nth(1) {
                Some(token) if !token.trim().is_empty() => {
                    debug!(scripts_scanned = scanned, "session token extracted");
                    Ok(token.trim().to_string())
                }
                _ => Err(ResolveError::token_not_found(scanned, html.len())),
            };
        }

        debug!(scripts_scanned = scanned, page_len = html.len(), "no token-bearing script");
        Err(ResolveError::token_not_found(scanned, html.len()))
    }
}

/// Extracts the session token using [`ScriptTokenExtractor::default`].
///
/// # Errors
///
/// Returns [`ResolveError::TokenNotFound`] when no token can be derived.
pub fn extract_token(html: &str) -> Result<String, ResolveError> {
    ScriptTokenExtractor::default().extract(html)
}
