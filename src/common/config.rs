//! Configuration file handling
//!
//! Values come from three layers, later ones winning: built-in defaults
//! pointing at the public demo services, an optional TOML file, and
//! `HARNESS_*` environment variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};
use crate::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Booking API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP call settings shared by every request
    #[serde(default)]
    pub http: HttpConfig,

    /// Demo site and WebDriver settings
    #[serde(default)]
    pub ui: UiConfig,

    /// Scenario runner settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Where the session places the credential on authenticated requests
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Cookie: token=<token>` (what restful-booker expects)
    #[default]
    Cookie,
    /// `Authorization: Bearer <token>`
    Bearer,
}

impl std::str::FromStr for AuthScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cookie" => Ok(AuthScheme::Cookie),
            "bearer" => Ok(AuthScheme::Bearer),
            other => Err(Error::Config(format!(
                "Unknown auth scheme '{}'. Supported: 'cookie', 'bearer'",
                other
            ))),
        }
    }
}

/// Booking API settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_username")]
    pub username: String,

    #[serde(default = "default_api_password")]
    pub password: String,

    #[serde(default)]
    pub auth_scheme: AuthScheme,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            username: default_api_username(),
            password: default_api_password(),
            auth_scheme: AuthScheme::default(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://restful-booker.herokuapp.com".to_string()
}
fn default_api_username() -> String {
    "admin".to_string()
}
fn default_api_password() -> String {
    "password123".to_string()
}

/// HTTP call settings
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-call timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts for a call failing with a transport fault
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each further one
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_delay(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    500
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

/// Demo site and browser settings
#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_ui_base_url")]
    pub base_url: String,

    /// W3C WebDriver endpoint (e.g. a local chromedriver)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_ui_username")]
    pub username: String,

    #[serde(default = "default_ui_password")]
    pub password: String,

    /// Explicit wait budget for UI conditions
    #[serde(default = "default_wait")]
    pub wait_timeout_secs: u64,

    /// Upper bound for login-to-inventory load time
    #[serde(default = "default_page_load_budget")]
    pub page_load_budget_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ui_base_url(),
            webdriver_url: default_webdriver_url(),
            headless: true,
            username: default_ui_username(),
            password: default_ui_password(),
            wait_timeout_secs: default_wait(),
            page_load_budget_ms: default_page_load_budget(),
        }
    }
}

fn default_ui_base_url() -> String {
    "https://www.saucedemo.com/".to_string()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}
fn default_true() -> bool {
    true
}
fn default_ui_username() -> String {
    "standard_user".to_string()
}
fn default_ui_password() -> String {
    "secret_sauce".to_string()
}
fn default_wait() -> u64 {
    5
}
fn default_page_load_budget() -> u64 {
    2000
}

impl UiConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Scenario runner settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RunnerConfig {
    /// Upper bound for a single step's action, retries included
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist. Environment
    /// overrides are applied in both cases.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply `HARNESS_*` overrides using the given variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HARNESS_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = lookup("HARNESS_USERNAME") {
            self.api.username = v;
        }
        if let Some(v) = lookup("HARNESS_PASSWORD") {
            self.api.password = v;
        }
        if let Some(v) = lookup("HARNESS_AUTH_SCHEME") {
            self.api.auth_scheme = v.parse()?;
        }
        if let Some(v) = lookup("HARNESS_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_env("HARNESS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("HARNESS_MAX_RETRIES") {
            self.http.max_retries = parse_env("HARNESS_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("HARNESS_RETRY_DELAY_MS") {
            self.http.retry_base_delay_ms = parse_env("HARNESS_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("HARNESS_UI_BASE_URL") {
            self.ui.base_url = v;
        }
        if let Some(v) = lookup("HARNESS_WEBDRIVER_URL") {
            self.ui.webdriver_url = v;
        }
        if let Some(v) = lookup("HARNESS_UI_USERNAME") {
            self.ui.username = v;
        }
        if let Some(v) = lookup("HARNESS_UI_PASSWORD") {
            self.ui.password = v;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_point_at_public_demo_services() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://restful-booker.herokuapp.com");
        assert_eq!(config.api.username, "admin");
        assert_eq!(config.api.auth_scheme, AuthScheme::Cookie);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.ui.base_url, "https://www.saucedemo.com/");
        assert!(config.runner.step_timeout_secs.is_none());
    }

    #[test]
    fn test_env_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("HARNESS_BASE_URL", "http://localhost:3001"),
            ("HARNESS_USERNAME", "tester"),
            ("HARNESS_MAX_RETRIES", "7"),
            ("HARNESS_AUTH_SCHEME", "bearer"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:3001");
        assert_eq!(config.api.username, "tester");
        assert_eq!(config.api.password, "password123");
        assert_eq!(config.http.max_retries, 7);
        assert_eq!(config.api.auth_scheme, AuthScheme::Bearer);
    }

    #[test]
    fn test_malformed_numeric_env_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == "HARNESS_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[http]\ntimeout_secs = 10\n\n[runner]\nstep_timeout_secs = 60"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.runner.step_timeout_secs, Some(60));
        assert_eq!(config.api.username, "admin");
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http\ntimeout_secs = ").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::ConfigParse(_))
        ));
    }
}
