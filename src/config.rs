//! Runtime configuration: defaults, config file, environment.
//!
//! Precedence, highest first: command-line flags (applied by the binary),
//! the `TERA_COOKIE` environment variable, the config file, built-in defaults.
//!
//! The config file is a flat list of `key = value` lines. Strings are
//! double-quoted, `#` starts a comment, unknown keys are rejected.
//!
//! ```text
//! max_attempts = 5
//! retry_backoff_ms = 1000
//! deadline_secs = 120
//! cookie = "abc123"   # long-lived credential
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

use crate::crawl::{CrawlLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_DIRECTORIES};
use crate::credential::{CREDENTIAL_ENV_VAR, CredentialStore};
use crate::fetch::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, FetchSettings, READ_TIMEOUT_SECS,
    RetryPolicy,
};
use crate::listing::{DEFAULT_API_BASE, DEFAULT_APP_ID, LinkRewrite};
use crate::resolver::{DEFAULT_PAGE_BASE, ResolverSettings};
use crate::user_agent::effective_user_agent;

const CONFIG_DIR_NAME: &str = "teralink";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Values read from the config file; `None` means "not set".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Attempts per fetch (1..=10).
    pub max_attempts: Option<u32>,
    /// Delay between attempts in milliseconds (0..=60000).
    pub retry_backoff_ms: Option<u64>,
    /// TCP connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Deepest sub-directory level crawled (1..=64).
    pub max_depth: Option<usize>,
    /// Most directories crawled per link (1..=100000).
    pub max_directories: Option<usize>,
    /// Overall deadline per link in seconds (1..=3600).
    pub deadline_secs: Option<u64>,
    /// Base URL of the share pages.
    pub page_base: Option<String>,
    /// Base URL of the listing API.
    pub api_base: Option<String>,
    /// Application id sent to the listing API.
    pub app_id: Option<String>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Long-lived credential.
    pub cookie: Option<String>,
}

impl fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileConfig")
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("max_depth", &self.max_depth)
            .field("max_directories", &self.max_directories)
            .field("deadline_secs", &self.deadline_secs)
            .field("page_base", &self.page_base)
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .field("user_agent", &self.user_agent)
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FileConfig {
    /// Validates values against their allowed ranges.
    ///
    /// # Errors
    ///
    /// Names the first offending key and its expected range.
    pub fn validate(&self) -> Result<()> {
        validate_range("max_attempts", self.max_attempts.map(u64::from), 1, 10)?;
        validate_range("retry_backoff_ms", self.retry_backoff_ms, 0, 60_000)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        validate_range("max_depth", self.max_depth.map(as_u64), 1, 64)?;
        validate_range("max_directories", self.max_directories.map(as_u64), 1, 100_000)?;
        validate_range("deadline_secs", self.deadline_secs, 1, 3600)?;
        validate_base_url("page_base", self.page_base.as_deref())?;
        validate_base_url("api_base", self.api_base.as_deref())?;
        Ok(())
    }
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

fn validate_base_url(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let parsed = Url::parse(value)
        .with_context(|| format!("Invalid config value for `{field}`: '{value}' is not a URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: '{value}'. Expected an http(s) URL");
    }
    Ok(())
}

/// A config file lookup result.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was consulted, if one could be determined.
    pub path: Option<PathBuf>,
    /// Parsed config when the file existed.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/teralink/config.toml`
/// 2. `$HOME/.config/teralink/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file from the default path; a missing file is not an error.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates the config file at `path`.
///
/// # Errors
///
/// Fails when the file cannot be read, has invalid syntax, unknown keys or
/// out-of-range values.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config file contents.
///
/// # Errors
///
/// Reports the 1-based line of the first syntax error, unknown key or
/// unparseable value, then runs [`FileConfig::validate`].
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.max_attempts = Some(u32::try_from(parsed).unwrap_or(u32::MAX));
            }
            "retry_backoff_ms" => {
                cfg.retry_backoff_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "max_depth" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.max_depth = Some(usize::try_from(parsed).unwrap_or(usize::MAX));
            }
            "max_directories" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.max_directories = Some(usize::try_from(parsed).unwrap_or(usize::MAX));
            }
            "deadline_secs" => {
                cfg.deadline_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "page_base" => cfg.page_base = Some(parse_string_literal(value).with_context(context)?),
            "api_base" => cfg.api_base = Some(parse_string_literal(value).with_context(context)?),
            "app_id" => cfg.app_id = Some(parse_string_literal(value).with_context(context)?),
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(context)?);
            }
            "cookie" => cfg.cookie = Some(parse_string_literal(value).with_context(context)?),
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    let Some(inner) = raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        bail!("Expected double-quoted string");
    };
    Ok(inner.to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

/// Fully resolved runtime settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Attempts per fetch, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_backoff: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// Deepest sub-directory level crawled.
    pub max_depth: usize,
    /// Most directories crawled per link.
    pub max_directories: usize,
    /// Overall deadline per link; `None` for unbounded.
    pub deadline: Option<Duration>,
    /// Base URL of the share pages.
    pub page_base: String,
    /// Base URL of the listing API.
    pub api_base: String,
    /// Application id sent to the listing API.
    pub app_id: String,
    /// User-Agent header value.
    pub user_agent: String,
    /// Long-lived credential; empty when none is configured.
    pub cookie: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_BACKOFF,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            max_depth: DEFAULT_MAX_DEPTH,
            max_directories: DEFAULT_MAX_DIRECTORIES,
            deadline: None,
            page_base: DEFAULT_PAGE_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            user_agent: effective_user_agent(None),
            cookie: String::new(),
        }
    }
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_depth", &self.max_depth)
            .field("max_directories", &self.max_directories)
            .field("deadline", &self.deadline)
            .field("page_base", &self.page_base)
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .field("cookie_configured", &!self.cookie.is_empty())
            .finish_non_exhaustive()
    }
}

impl ResolverConfig {
    /// Overlays values set in the config file.
    #[must_use]
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if let Some(value) = file.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = file.retry_backoff_ms {
            self.retry_backoff = Duration::from_millis(value);
        }
        if let Some(value) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(value);
        }
        if let Some(value) = file.read_timeout_secs {
            self.read_timeout = Duration::from_secs(value);
        }
        if let Some(value) = file.max_depth {
            self.max_depth = value;
        }
        if let Some(value) = file.max_directories {
            self.max_directories = value;
        }
        if let Some(value) = file.deadline_secs {
            self.deadline = Some(Duration::from_secs(value));
        }
        if let Some(value) = &file.page_base {
            self.page_base.clone_from(value);
        }
        if let Some(value) = &file.api_base {
            self.api_base.clone_from(value);
        }
        if let Some(value) = &file.app_id {
            self.app_id.clone_from(value);
        }
        if let Some(value) = &file.user_agent {
            self.user_agent = effective_user_agent(Some(value));
        }
        if let Some(value) = &file.cookie {
            self.cookie = value.trim().to_string();
        }
        self
    }

    /// Overlays the credential from `TERA_COOKIE` when it is set and non-blank.
    #[must_use]
    pub fn with_env(self) -> Self {
        let cookie = env::var(CREDENTIAL_ENV_VAR).ok();
        self.with_cookie(cookie.as_deref())
    }

    /// Overlays a credential; `None` or a blank value keeps the current one.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Option<&str>) -> Self {
        if let Some(value) = cookie.map(str::trim).filter(|value| !value.is_empty()) {
            self.cookie = value.to_string();
        }
        self
    }

    /// Network settings for [`crate::fetch::HttpFetcher`].
    #[must_use]
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            user_agent: self.user_agent.clone(),
            retry: RetryPolicy::new(self.max_attempts, self.retry_backoff),
        }
    }

    /// Engine settings for [`crate::resolver::ShareResolver`].
    #[must_use]
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            page_base: self.page_base.clone(),
            api_base: self.api_base.clone(),
            app_id: self.app_id.clone(),
            rewrite: LinkRewrite::default(),
            limits: CrawlLimits {
                max_depth: self.max_depth,
                max_directories: self.max_directories,
            },
            deadline: self.deadline,
        }
    }

    /// A credential store seeded with the configured cookie.
    #[must_use]
    pub fn credential(&self) -> CredentialStore {
        CredentialStore::new(self.cookie.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
max_attempts = 3
app_id = "4242"
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_attempts, Some(3));
        assert_eq!(cfg.app_id.as_deref(), Some("4242"));
        assert!(cfg.cookie.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
# credential rotated weekly
cookie = "abc#123" # hash inside quotes is kept
deadline_secs = 90 # per link
"#,
        )
        .unwrap();
        assert_eq!(cfg.cookie.as_deref(), Some("abc#123"));
        assert_eq!(cfg.deadline_secs, Some(90));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys_with_line() {
        let err = parse_config_str("max_attempts = 2\nconcurrency = 4").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown configuration key"));
        assert!(msg.contains("concurrency"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("max_attempts 2").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        for (input, field) in [
            ("max_attempts = 0", "max_attempts"),
            ("max_attempts = 11", "max_attempts"),
            ("retry_backoff_ms = 60001", "retry_backoff_ms"),
            ("connect_timeout_secs = 0", "connect_timeout_secs"),
            ("read_timeout_secs = 3601", "read_timeout_secs"),
            ("max_depth = 65", "max_depth"),
            ("max_directories = 0", "max_directories"),
            ("deadline_secs = 0", "deadline_secs"),
        ] {
            let err = parse_config_str(input).unwrap_err();
            assert!(err.to_string().contains(field), "{input}: {err}");
        }
    }

    #[test]
    fn test_parse_config_rejects_bad_value_types() {
        assert!(parse_config_str("max_attempts = three").is_err());
        assert!(parse_config_str("max_attempts = -1").is_err());
        assert!(parse_config_str("cookie = unquoted").is_err());
        assert!(parse_config_str("max_depth = 4 trailing").is_err());
    }

    #[test]
    fn test_parse_config_rejects_non_http_base() {
        let err = parse_config_str(r#"api_base = "ftp://terabox.com""#).unwrap_err();
        assert!(err.to_string().contains("api_base"));
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.max_directories, 500);
        assert!(config.deadline.is_none());
        assert_eq!(config.app_id, "250528");
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_precedence_file_then_cookie_override() {
        let file = parse_config_str(
            r#"
max_attempts = 2
retry_backoff_ms = 250
cookie = "from-file"
"#,
        )
        .unwrap();
        let config = ResolverConfig::default().with_file(&file);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.cookie, "from-file");

        let config = config.with_cookie(Some("  "));
        assert_eq!(config.cookie, "from-file");
        let config = config.with_cookie(Some("from-env"));
        assert_eq!(config.cookie, "from-env");
    }

    #[test]
    fn test_settings_builders() {
        let file = parse_config_str("max_attempts = 3\nmax_depth = 4\ndeadline_secs = 60").unwrap();
        let config = ResolverConfig::default().with_file(&file);

        let fetch = config.fetch_settings();
        assert_eq!(fetch.retry.max_attempts(), 3);

        let settings = config.resolver_settings();
        assert_eq!(settings.limits.max_depth, 4);
        assert_eq!(settings.deadline, Some(Duration::from_secs(60)));
        assert!(!config.credential().is_configured());
    }

    #[test]
    fn test_debug_redacts_cookie() {
        let file = parse_config_str(r#"cookie = "secret-value""#).unwrap();
        assert!(!format!("{file:?}").contains("secret-value"));
        let config = ResolverConfig::default().with_file(&file);
        assert!(!format!("{config:?}").contains("secret-value"));
    }

    #[test]
    fn test_load_file_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "max_attempts = 99").unwrap();

        let err = load_file_config(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("max_attempts"));
    }

    #[test]
    fn test_load_file_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file_config(&dir.path().join("absent.toml")).is_err());
    }
}
