//! Configuration management for the checkclaw CLI
//!
//! Centralizes the values that commands would otherwise hardcode, and resolves
//! them from CLI flags, environment variables and the config file.

use std::env;
use std::time::Duration;

use crate::config_file::{ConfigFile, ProfileConfig};

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://api.checkclaw.com";

/// Default hosted consent page for bank linking
pub const DEFAULT_LINK_URL: &str = "https://app.checkclaw.com/link";

/// How long the link flow waits for the browser before giving up
pub const DEFAULT_LINK_TIMEOUT_SECS: u64 = 120;

/// Connection settings after applying precedence:
/// CLI flags, then environment, then the config profile, then defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub link_url: String,
    pub link_timeout: Duration,
    /// `human` or `json` when set by environment or config file
    pub output_format: Option<String>,
}

impl Settings {
    /// Resolve from the process environment
    #[must_use]
    pub fn resolve(
        cli_api_url: Option<&str>,
        cli_timeout_secs: Option<u64>,
        file: &ConfigFile,
        profile: Option<&ProfileConfig>,
    ) -> Self {
        Self::resolve_with(
            cli_api_url,
            cli_timeout_secs,
            profile,
            file.defaults.output_format.as_deref(),
            |key| env::var(key).ok(),
        )
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with(
        cli_api_url: Option<&str>,
        cli_timeout_secs: Option<u64>,
        profile: Option<&ProfileConfig>,
        file_output_format: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let api_url = cli_api_url
            .map(String::from)
            .or_else(|| env("CHECKCLAW_API_URL"))
            .or_else(|| profile.map(|p| p.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let link_url = env("CHECKCLAW_LINK_URL")
            .or_else(|| profile.and_then(|p| p.link_url.clone()))
            .unwrap_or_else(|| DEFAULT_LINK_URL.to_string());

        let timeout_secs = cli_timeout_secs
            .or_else(|| env("CHECKCLAW_LINK_TIMEOUT_SECS").and_then(|s| s.parse().ok()))
            .or_else(|| profile.and_then(|p| p.link_timeout_secs))
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_LINK_TIMEOUT_SECS);

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            link_url,
            link_timeout: Duration::from_secs(timeout_secs),
            output_format: env("CHECKCLAW_DEFAULT_OUTPUT_FORMAT")
                .or_else(|| file_output_format.map(String::from)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileConfig {
        ProfileConfig {
            api_url: "http://127.0.0.1:8787/".to_string(),
            link_url: Some("http://127.0.0.1:8787/link".to_string()),
            link_timeout_secs: Some(300),
        }
    }

    #[test]
    fn test_settings_precedence() {
        let no_env = |_: &str| None;

        let defaults = Settings::resolve_with(None, None, None, None, no_env);
        assert_eq!(defaults.api_url, DEFAULT_API_URL);
        assert_eq!(defaults.link_url, DEFAULT_LINK_URL);
        assert_eq!(defaults.link_timeout, Duration::from_secs(120));
        assert_eq!(defaults.output_format, None);

        let from_profile = Settings::resolve_with(None, None, Some(&profile()), Some("json"), no_env);
        assert_eq!(from_profile.api_url, "http://127.0.0.1:8787");
        assert_eq!(from_profile.link_timeout, Duration::from_secs(300));
        assert_eq!(from_profile.output_format.as_deref(), Some("json"));

        let env = |key: &str| match key {
            "CHECKCLAW_API_URL" => Some("https://env.example".to_string()),
            "CHECKCLAW_LINK_TIMEOUT_SECS" => Some("45".to_string()),
            _ => None,
        };
        let from_env = Settings::resolve_with(None, None, Some(&profile()), None, env);
        assert_eq!(from_env.api_url, "https://env.example");
        assert_eq!(from_env.link_url, "http://127.0.0.1:8787/link");
        assert_eq!(from_env.link_timeout, Duration::from_secs(45));

        let from_cli =
            Settings::resolve_with(Some("https://cli.example"), Some(10), Some(&profile()), None, env);
        assert_eq!(from_cli.api_url, "https://cli.example");
        assert_eq!(from_cli.link_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let settings = Settings::resolve_with(None, Some(0), None, None, |_| None);
        assert_eq!(settings.link_timeout, Duration::from_secs(120));
    }
}
