//! Shared User-Agent string for provider requests.
//!
//! The provider serves its share pages only to browser-like clients, so the
//! default is a generic browser UA rather than a tool identifier.

/// Browser User-Agent sent on every request unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the configured user agent, falling back to [`DEFAULT_USER_AGENT`] when blank.
#[must_use]
pub fn effective_user_agent(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_browser_like() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0"));
        assert_eq!(effective_user_agent(None), DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_blank_override_falls_back() {
        assert_eq!(effective_user_agent(Some("   ")), DEFAULT_USER_AGENT);
        assert_eq!(effective_user_agent(Some("custom/1.0")), "custom/1.0");
    }
}
