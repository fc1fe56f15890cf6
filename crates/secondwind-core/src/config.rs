//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, the request timeout and an optional refresh
//! cookie for headless sessions.
//!
//! Configuration is stored at `~/.config/secondwind/config.json` and can be
//! overridden from the environment (`SECONDWIND_API_URL`,
//! `SECONDWIND_REFRESH_COOKIE`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "secondwind";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API base URL (local development backend)
const DEFAULT_API_URL: &str = "https://localhost:8443";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path of the token refresh endpoint, relative to the API base.
const REFRESH_PATH: &str = "refresh/token";

const ENV_API_URL: &str = "SECONDWIND_API_URL";
const ENV_REFRESH_COOKIE: &str = "SECONDWIND_REFRESH_COOKIE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Raw `name=value` refresh cookie to seed the cookie jar with.
    /// Browsers hold this as an httpOnly cookie; headless callers need it here.
    pub refresh_cookie: Option<String>,
    pub keyring_account: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_cookie: None,
            keyring_account: None,
        }
    }
}

impl Config {
    /// Create a config pointing at the given API base URL
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Load config from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
        if let Ok(cookie) = std::env::var(ENV_REFRESH_COOKIE) {
            if !cookie.trim().is_empty() {
                self.refresh_cookie = Some(cookie.trim().to_string());
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Resolve an endpoint path against the API base URL.
    /// Absolute URLs are returned unchanged.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn refresh_url(&self) -> String {
        self.endpoint(REFRESH_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = Config::with_api_url("https://api.example.com/");
        assert_eq!(config.endpoint("/my"), "https://api.example.com/my");
        assert_eq!(config.endpoint("crew/all"), "https://api.example.com/crew/all");

        let config = Config::with_api_url("https://api.example.com");
        assert_eq!(config.endpoint("/board/posts"), "https://api.example.com/board/posts");
    }

    #[test]
    fn test_endpoint_passes_absolute_urls() {
        let config = Config::with_api_url("https://api.example.com");
        assert_eq!(
            config.endpoint("https://other.example.com/user/profile"),
            "https://other.example.com/user/profile"
        );
    }

    #[test]
    fn test_refresh_url() {
        let config = Config::with_api_url("http://127.0.0.1:8080");
        assert_eq!(config.refresh_url(), "http://127.0.0.1:8080/refresh/token");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_url": "https://x.test"}"#)
            .expect("Failed to parse partial config");
        assert_eq!(config.api_url, "https://x.test");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.refresh_cookie.is_none());
    }
}
