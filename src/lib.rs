//! Teralink Core Library
//!
//! This library resolves cloud-storage share links into direct download
//! links: it normalizes the link, performs the page handshake that yields a
//! session token, queries the listing API and flattens folder trees into a
//! list of downloadable files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`link`] - Share-link normalization, key recovery, discovery in text
//! - [`fetch`] - HTTP fetch layer with bounded retry
//! - [`token`] - Session-token extraction from share pages
//! - [`listing`] - Listing API client and file descriptors
//! - [`crawl`] - Iterative, bounded folder crawler
//! - [`resolver`] - Resolution facade and error types
//! - [`credential`] - Rotatable long-lived credential
//! - [`config`] - Defaults, config file and environment overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod credential;
pub mod fetch;
pub mod link;
pub mod listing;
pub mod resolver;
pub mod token;
pub mod user_agent;
pub mod utils;

// Re-export commonly used types
pub use crawl::{CrawlLimits, FolderCrawler};
pub use credential::CredentialStore;
pub use fetch::{FetchError, FetchSettings, Fetcher, HttpFetcher, RetryPolicy};
pub use link::{NormalizedLink, ShareReference, extract_key_and_path, extract_share_links, normalize};
pub use listing::{FileDescriptor, LinkRewrite, ListingClient, ListingEntry};
pub use resolver::{ResolveError, Resolution, ResolverSettings, ShareResolver};
pub use token::{ScriptTokenExtractor, TokenExtractor, extract_token};
