//! Listing data model: raw entries, presentation-ready file descriptors, and
//! the download-link domain rewrite.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use url::Url;

use crate::resolver::ResolveError;

/// Display name used when the listing omits `server_filename`.
pub const PLACEHOLDER_NAME: &str = "Unknown";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One row of a directory listing, kept lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// True for sub-directories.
    pub is_directory: bool,
    /// File or directory name.
    pub name: String,
    /// Absolute path inside the share.
    pub path: String,
    /// Size in bytes; 0 for directories.
    pub size_bytes: u64,
    /// Provider download link; always `None` for directories.
    pub direct_download_link: Option<String>,
    /// Thumbnail URL, when the provider generated one.
    pub thumbnail_url: Option<String>,
}

/// The resolved, presentation-ready output unit for one downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// Download link with the domain rewrite applied.
    pub download_link: String,
    /// File name shown to the user.
    pub display_name: String,
    /// Size formatted as `X.XX MB`.
    pub human_size: String,
    /// Thumbnail URL, when present.
    pub thumbnail_url: Option<String>,
}

impl FileDescriptor {
    /// Builds a descriptor from a file entry, rewriting its download link.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RemoteApiFailure`] when the entry is a
    /// directory or carries no usable download link.
    pub fn from_entry(entry: &ListingEntry, rewrite: &LinkRewrite) -> Result<Self, ResolveError> {
        if entry.is_directory {
            return Err(ResolveError::remote_api(
                None,
                format!("'{}' is a directory, not a file", entry.path),
            ));
        }

        let link = entry
            .direct_download_link
            .as_deref()
            .and_then(|link| rewrite.apply(link))
            .ok_or_else(|| {
                ResolveError::remote_api(
                    None,
                    format!("file '{}' has no usable download link", entry.name),
                )
            })?;

        Ok(Self {
            download_link: link,
            display_name: entry.name.clone(),
            human_size: human_size(entry.size_bytes),
            thumbnail_url: entry.thumbnail_url.clone(),
        })
    }
}

/// Formats a byte count as megabytes with two decimals (`104857600` → `"100.00 MB"`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// Deterministic host-suffix substitution for download links.
///
/// The listing API hands out links on a partner domain; consumers expect the
/// normalized one. Only the host is rewritten, and rewriting an already
/// rewritten link is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRewrite {
    from_suffix: String,
    to_suffix: String,
}

impl Default for LinkRewrite {
    fn default() -> Self {
        Self::new(".com", ".app")
    }
}

impl LinkRewrite {
    /// Creates a rewrite replacing host suffix `from_suffix` with `to_suffix`.
    #[must_use]
    pub fn new(from_suffix: impl Into<String>, to_suffix: impl Into<String>) -> Self {
        Self {
            from_suffix: from_suffix.into().to_ascii_lowercase(),
            to_suffix: to_suffix.into().to_ascii_lowercase(),
        }
    }

    /// A rewrite that leaves links untouched.
    #[must_use]
    pub fn identity() -> Self {
        Self::new("", "")
    }

    /// Applies the rewrite; `None` when `link` is not an absolute URL with a host.
    #[must_use]
    pub fn apply(&self, link: &str) -> Option<String> {
        let mut url = Url::parse(link.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();

        if self.from_suffix.is_empty() || self.from_suffix == self.to_suffix {
            return Some(url.to_string());
        }

        if let Some(stem) = host.strip_suffix(&self.from_suffix) {
            let rewritten = format!("{stem}{}", self.to_suffix);
            if let Err(error) = url.set_host(Some(&rewritten)) {
                warn!(host = %host, error = %error, "download link host rewrite rejected");
                return None;
            }
        }
        Some(url.to_string())
    }
}

/// Wire shape of one `list` item; every field tolerates absence and type drift.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawListItem {
    #[serde(deserialize_with = "flag")]
    isdir: bool,
    server_filename: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    size: u64,
    dlink: Option<String>,
    path: Option<String>,
    thumbs: Option<RawThumbs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawThumbs {
    url3: Option<String>,
}

impl RawListItem {
    /// Converts into a [`ListingEntry`]; `parent` fills in a missing directory path.
    pub(crate) fn into_entry(self, parent: &str) -> ListingEntry {
        let name = self
            .server_filename
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());

        let path = self
            .path
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| join_path(parent, &name));

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        ListingEntry {
            is_directory: self.isdir,
            size_bytes: if self.isdir { 0 } else { self.size },
            direct_download_link: if self.isdir { None } else { non_empty(self.dlink) },
            thumbnail_url: non_empty(self.thumbs.and_then(|thumbs| thumbs.url3)),
            name,
            path,
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    format!("{}/{name}", parent.trim_end_matches('/'))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// `isdir` arrives as `"0"`/`"1"`, `0`/`1`, or a bool depending on endpoint version.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlagRepr>::deserialize(deserializer)? {
        Some(FlagRepr::Bool(value)) => value,
        Some(FlagRepr::Int(value)) => value != 0,
        Some(FlagRepr::Str(value)) => matches!(value.trim(), "1" | "true"),
        None => false,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(u64),
    Float(f64),
    Str(String),
    Other(serde_json::Value),
}

/// Sizes arrive as numbers or numeric strings; anything else degrades to 0.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberRepr::deserialize(deserializer)? {
        NumberRepr::Int(value) => value,
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        NumberRepr::Float(value) if value.is_finite() && value >= 0.0 => value as u64,
        NumberRepr::Str(value) => value.trim().parse().unwrap_or(0),
        NumberRepr::Float(_) | NumberRepr::Other(_) => 0,
    })
}
