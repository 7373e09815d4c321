//! Shared helpers: static regex compilation, host normalization, and
//! trailing-punctuation cleanup for links embedded in prose.

use regex::Regex;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Normalizes a host string: trim, lowercase, strip a leading "www." and trailing '.'.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    let lowered = host.trim().to_ascii_lowercase();
    lowered
        .strip_prefix("www.")
        .unwrap_or(&lowered)
        .trim_end_matches('.')
        .to_string()
}

/// Strips sentence punctuation and unbalanced closing brackets that prose
/// tends to glue onto the end of a link.
#[must_use]
pub fn trim_link_trailing(link: &str) -> &str {
    let mut result = link;
    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' => {
                result = &result[..result.len() - 1];
            }
            ')' | ']' | '}' => {
                let open = match last {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                let open_count = result.chars().filter(|&c| c == open).count();
                let close_count = result.chars().filter(|&c| c == last).count();
                if close_count > open_count {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    result
}
