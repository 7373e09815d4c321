//! Allow-list of provider mirror hostnames.

use crate::utils::canonical_host;

/// Known mirror domains serving the same share namespace.
pub const ACCEPTED_DOMAINS: [&str; 10] = [
    "terabox.com",
    "terabox.app",
    "1024tera.com",
    "terasharelink.com",
    "nephobox.com",
    "1024terabox.com",
    "4funbox.com",
    "mirrobox.com",
    "momerybox.com",
    "teraboxapp.com",
];

/// Returns true if `host` is an allow-listed domain, ignoring case and an optional `www.`.
#[must_use]
pub fn is_accepted_host(host: &str) -> bool {
    let host = canonical_host(host);
    ACCEPTED_DOMAINS.contains(&host.as_str())
}
