//! Resolved, immutable client configuration.
//!
//! [`ClientConfig`] is built once per client, either from defaults with the
//! `with_*` setters or from a [`CraftConfig`] file model, and validated as it is
//! built. Nothing downstream deals with optional or unchecked values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use craft_config::{CraftConfig, NothingPolicy};
use craft_store::{DEFAULT_INDENT, MAX_INDENT, StoreOptions};
use craft_utils::expand_path;
use url::Url;

use crate::error::{CraftError, Result};

pub const DEFAULT_API_URL: &str = "https://neal.fun";
pub const DEFAULT_RATE_LIMIT: u32 = 400;
pub const DEFAULT_DISCOVERIES_PATH: &str = "discoveries.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const SUPPORTED_ENCODING: &str = "utf-8";

/// Browser-like header set the game expects from its own front end.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("priority", "u=1, i"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    ("Referer", "https://neal.fun/infinite-craft/"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    (
        "User-Agent",
        concat!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
            "(KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36"
        ),
    ),
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_url: Url,
    rate_limit: u32,
    manual_control: bool,
    timeout: Duration,
    nothing_policy: NothingPolicy,
    debug: bool,
    headers: Vec<(String, String)>,
    discoveries_path: PathBuf,
    indent: usize,
    make_file: bool,
    reset_on_start: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL"),
            rate_limit: DEFAULT_RATE_LIMIT,
            manual_control: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            nothing_policy: NothingPolicy::default(),
            debug: false,
            headers: DEFAULT_HEADERS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            discoveries_path: PathBuf::from(DEFAULT_DISCOVERIES_PATH),
            indent: DEFAULT_INDENT,
            make_file: true,
            reset_on_start: false,
        }
    }
}

impl ClientConfig {
    /// Resolve the file model, falling back to defaults for missing values.
    pub fn from_config(file: &CraftConfig) -> Result<Self> {
        let client = &file.client;
        let storage = &file.storage;

        let mut config = Self::default()
            .with_manual_control(client.manual_control)
            .with_debug(client.debug)
            .with_make_file(storage.make_file)
            .with_reset_on_start(storage.reset);

        if let Some(url) = client.api_url.as_deref() {
            config = config.with_api_url(url)?;
        }
        if let Some(limit) = client.rate_limit {
            config = config.with_rate_limit(limit);
        }
        if let Some(secs) = client.timeout_seconds {
            config = config.with_timeout(Duration::from_secs(u64::from(secs)));
        }
        if let Some(policy) = client.nothing_policy {
            config = config.with_nothing_policy(policy);
        }
        for (name, value) in &client.headers {
            config = config.with_header(name, value);
        }
        if let Some(path) = storage.discoveries.as_deref() {
            config = config.with_discoveries_path(expand_path(path));
        }
        if let Some(encoding) = storage.encoding.as_deref() {
            config = config.with_encoding(encoding)?;
        }
        if let Some(indent) = storage.indent {
            config = config.with_indent(usize::from(indent))?;
        }

        Ok(config)
    }

    /// Base URL of the game. Must be absolute http(s).
    pub fn with_api_url(mut self, url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| CraftError::invalid(format!("api_url '{url}' is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CraftError::invalid(format!(
                "api_url '{url}' must use http or https"
            )));
        }
        self.api_url = parsed;
        Ok(self)
    }

    /// Requests per rolling minute. `0` disables throttling.
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn with_manual_control(mut self, manual: bool) -> Self {
        self.manual_control = manual;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_nothing_policy(mut self, policy: NothingPolicy) -> Self {
        self.nothing_policy = policy;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set a request header, replacing any existing header of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_discoveries_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.discoveries_path = path.into();
        self
    }

    /// Only UTF-8 is supported; anything else is rejected.
    pub fn with_encoding(self, encoding: &str) -> Result<Self> {
        let normalized = encoding.trim().to_ascii_lowercase().replace('_', "-");
        if matches!(normalized.as_str(), "utf-8" | "utf8") {
            Ok(self)
        } else {
            Err(CraftError::invalid(format!(
                "unsupported encoding '{encoding}' (only {SUPPORTED_ENCODING} is supported)"
            )))
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Result<Self> {
        if indent > MAX_INDENT {
            return Err(CraftError::invalid(format!(
                "indent must be at most {MAX_INDENT}, got {indent}"
            )));
        }
        self.indent = indent;
        Ok(self)
    }

    pub fn with_make_file(mut self, make_file: bool) -> Self {
        self.make_file = make_file;
        self
    }

    pub fn with_reset_on_start(mut self, reset: bool) -> Self {
        self.reset_on_start = reset;
        self
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    #[must_use]
    pub fn manual_control(&self) -> bool {
        self.manual_control
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn nothing_policy(&self) -> NothingPolicy {
        self.nothing_policy
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn discoveries_path(&self) -> &Path {
        &self.discoveries_path
    }

    #[must_use]
    pub fn make_file(&self) -> bool {
        self.make_file
    }

    #[must_use]
    pub fn reset_on_start(&self) -> bool {
        self.reset_on_start
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            indent: self.indent,
            make_file: self.make_file,
        }
    }

    /// Absolute URL for an endpoint path, keeping any path prefix of the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| CraftError::invalid(format!("bad endpoint '{joined}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(config: &'a ClientConfig, name: &str) -> Vec<&'a str> {
        config
            .headers()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn defaults_match_the_public_game() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url().as_str(), "https://neal.fun/");
        assert_eq!(config.rate_limit(), 400);
        assert!(!config.manual_control());
        assert!(config.make_file());
        assert!(!config.reset_on_start());
        assert_eq!(config.discoveries_path(), Path::new("discoveries.json"));
        assert_eq!(config.nothing_policy(), NothingPolicy::Empty);
        assert!(!config.debug());
        assert_eq!(header(&config, "referer"), ["https://neal.fun/infinite-craft/"]);
    }

    #[test]
    fn user_header_replaces_builtin_case_insensitively() {
        let config = ClientConfig::default().with_header("user-agent", "crafter/1.0");
        assert_eq!(header(&config, "User-Agent"), ["crafter/1.0"]);
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(ClientConfig::default().with_api_url("ftp://neal.fun").is_err());
        assert!(ClientConfig::default().with_api_url("not a url").is_err());
        assert!(ClientConfig::default().with_api_url("http://127.0.0.1:9").is_ok());
    }

    #[test]
    fn only_utf8_encoding_is_accepted() {
        assert!(ClientConfig::default().with_encoding("UTF-8").is_ok());
        assert!(ClientConfig::default().with_encoding("utf_8").is_ok());
        assert!(matches!(
            ClientConfig::default().with_encoding("latin-1"),
            Err(CraftError::InvalidArgument(_))
        ));
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = ClientConfig::default()
            .with_api_url("http://localhost:8080/proxy/")
            .expect("valid url");
        assert_eq!(
            config.endpoint("/api/infinite-craft/pair").expect("endpoint").as_str(),
            "http://localhost:8080/proxy/api/infinite-craft/pair"
        );
    }

    #[test]
    fn resolves_file_model() {
        let file = CraftConfig::parse(
            r#"
            [client]
            api_url = "http://127.0.0.1:8080"
            rate_limit = 0
            nothing_policy = "absent"
            debug = true

            [client.headers]
            "X-Test" = "1"

            [storage]
            discoveries = "data/d.json"
            indent = 4
            make_file = false
            "#,
        )
        .expect("config parses");

        let config = ClientConfig::from_config(&file).expect("resolves");
        assert_eq!(config.rate_limit(), 0);
        assert_eq!(config.nothing_policy(), NothingPolicy::Absent);
        assert!(config.debug());
        assert_eq!(header(&config, "x-test"), ["1"]);
        assert_eq!(config.discoveries_path(), Path::new("data/d.json"));
        assert_eq!(config.store_options().indent, 4);
        assert!(!config.store_options().make_file);
    }

    #[test]
    fn file_model_with_bad_encoding_fails() {
        let file = CraftConfig::parse("[storage]\nencoding = \"cp1252\"\n").expect("parses");
        assert!(ClientConfig::from_config(&file).is_err());
    }
}
