//! Folder crawler: expands directory entries into a flat file list.
//!
//! The walk is iterative. Each directory being expanded is a frame on an
//! explicit stack holding its not-yet-visited entries, so the output order
//! matches a naive depth-first recursion (files and sub-directories in the
//! order the listing API returned them) without growing the call stack.
//! Depth and directory-count bounds stop hostile or runaway trees.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, instrument, warn};

use crate::listing::{FileDescriptor, LinkRewrite, ListingClient, ListingEntry};
use crate::resolver::ResolveError;

/// Default maximum nesting below the starting directory.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Default maximum number of directories expanded in one crawl.
pub const DEFAULT_MAX_DIRECTORIES: usize = 500;

/// Safety bounds on folder expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Deepest sub-directory level that may be listed.
    pub max_depth: usize,
    /// Most directories that may be listed.
    pub max_directories: usize,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_directories: DEFAULT_MAX_DIRECTORIES,
        }
    }
}

/// Walks a share's directory tree through a [`ListingClient`].
#[derive(Debug, Clone)]
pub struct FolderCrawler {
    listing: ListingClient,
    rewrite: LinkRewrite,
    limits: CrawlLimits,
}

struct Frame {
    pending: VecDeque<ListingEntry>,
    depth: usize,
}

impl FolderCrawler {
    /// Creates a crawler listing through `listing` and rewriting links with `rewrite`.
    #[must_use]
    pub fn new(listing: ListingClient, rewrite: LinkRewrite, limits: CrawlLimits) -> Self {
        Self {
            listing,
            rewrite,
            limits,
        }
    }

    /// The listing client used for every directory request.
    #[must_use]
    pub fn listing(&self) -> &ListingClient {
        &self.listing
    }

    /// Lists `dir_path` and returns every file beneath it.
    ///
    /// # Errors
    ///
    /// Propagates listing failures, fails with
    /// [`ResolveError::CrawlLimitExceeded`] when a bound is hit and with
    /// [`ResolveError::RemoteApiFailure`] for a file without a download link.
    #[instrument(skip(self, token), fields(key = %key, dir = %dir_path))]
    pub async fn crawl(
        &self,
        key: &str,
        token: &str,
        dir_path: &str,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        let entries = self.listing.list(key, dir_path, token).await?;
        self.walk(key, token, dir_path, entries).await
    }

    /// Walks the already-fetched listing of `dir_path`, expanding its directories.
    ///
    /// `dir_path` counts as expanded, so an entry pointing back at it is skipped.
    ///
    /// # Errors
    ///
    /// Same as [`crawl`](Self::crawl).
    #[instrument(skip(self, token, entries), fields(key = %key, dir = %dir_path, entries = entries.len()))]
    pub async fn crawl_entries(
        &self,
        key: &str,
        token: &str,
        dir_path: &str,
        entries: Vec<ListingEntry>,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        self.walk(key, token, dir_path, entries).await
    }

    async fn walk(
        &self,
        key: &str,
        token: &str,
        dir_path: &str,
        entries: Vec<ListingEntry>,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        let mut visited = HashSet::from([visit_key(dir_path)]);
        let mut expanded = 1;
        let mut files = Vec::new();
        let mut stack = vec![Frame {
            pending: entries.into(),
            depth: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.pending.pop_front() else {
                stack.pop();
                continue;
            };
            let depth = frame.depth;

            if !entry.is_directory {
                files.push(FileDescriptor::from_entry(&entry, &self.rewrite)?);
                continue;
            }

            if !visited.insert(visit_key(&entry.path)) {
                warn!(path = %entry.path, "directory already expanded, skipping");
                continue;
            }

            let child_depth = depth + 1;
            if child_depth > self.limits.max_depth {
                return Err(ResolveError::crawl_limit(
                    &entry.path,
                    "depth",
                    self.limits.max_depth,
                ));
            }
            expanded += 1;
            if expanded > self.limits.max_directories {
                return Err(ResolveError::crawl_limit(
                    &entry.path,
                    "directory",
                    self.limits.max_directories,
                ));
            }

            let children = self.listing.list(key, &entry.path, token).await?;
            debug!(path = %entry.path, depth = child_depth, children = children.len(), "expanding directory");
            stack.push(Frame {
                pending: children.into(),
                depth: child_depth,
            });
        }

        debug!(files = files.len(), directories = expanded, "crawl complete");
        Ok(files)
    }
}

/// `/a/` and `/a` name the same directory.
fn visit_key(path: &str) -> String {
    match path.trim().trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}
