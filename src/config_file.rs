//! Persistent configuration file management for the checkclaw CLI
//!
//! Manages the TOML configuration file stored in XDG-compliant locations,
//! supporting profiles for different API deployments (production, staging, local).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_API_URL, DEFAULT_LINK_URL};

/// Persistent configuration file structure
///
/// Configuration precedence order (highest to lowest):
///
/// 1. CLI flags (`--api-url`, `--profile`, etc.)
/// 2. Environment variables (`CHECKCLAW_API_URL`, etc.)
/// 3. Config file active profile
/// 4. Hardcoded defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Configuration file version for migration support
    #[serde(default = "default_version")]
    pub version: String,

    /// Default settings that apply across all profiles
    #[serde(default)]
    pub defaults: DefaultConfig,

    /// Named profiles for different deployments
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Default configuration values
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultConfig {
    /// Active profile name
    pub active_profile: Option<String>,

    /// Default output format (human or json)
    pub output_format: Option<String>,
}

/// Profile-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileConfig {
    /// API base URL for this profile
    pub api_url: String,

    /// Hosted consent page used by `link`
    pub link_url: Option<String>,

    /// Link flow timeout override in seconds
    pub link_timeout_secs: Option<u64>,
}

impl ProfileConfig {
    fn with_urls(api_url: &str, link_url: Option<&str>) -> Self {
        Self {
            api_url: api_url.to_string(),
            link_url: link_url.map(String::from),
            link_timeout_secs: None,
        }
    }
}

impl ConfigFile {
    /// Create a new config file with the default profiles
    #[must_use]
    pub fn new() -> Self {
        let mut profiles = BTreeMap::new();

        profiles.insert(
            "production".to_string(),
            ProfileConfig::with_urls(DEFAULT_API_URL, Some(DEFAULT_LINK_URL)),
        );
        profiles.insert(
            "staging".to_string(),
            ProfileConfig::with_urls(
                "https://api.staging.checkclaw.com",
                Some("https://app.staging.checkclaw.com/link"),
            ),
        );
        profiles.insert(
            "local".to_string(),
            ProfileConfig::with_urls("http://127.0.0.1:8787", None),
        );

        Self {
            version: default_version(),
            defaults: DefaultConfig {
                active_profile: Some("production".to_string()),
                output_format: Some("human".to_string()),
            },
            profiles,
        }
    }

    /// Load config file from XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config file from an explicit path, falling back to defaults when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config file to XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or file cannot be written
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config file to an explicit path
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or file cannot be written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Directory holding checkclaw's config and credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("checkclaw"))
    }

    /// Get XDG-compliant config file path
    ///
    /// Returns `~/.config/checkclaw/config.toml` on Linux
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the active profile configuration
    #[must_use]
    pub fn active_profile(&self) -> Option<&ProfileConfig> {
        self.defaults
            .active_profile
            .as_ref()
            .and_then(|name| self.profiles.get(name))
    }

    /// Get a specific profile by name
    #[must_use]
    pub fn get_profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.get(name)
    }

    /// Set the active profile
    pub fn set_active_profile(&mut self, profile_name: String) {
        self.defaults.active_profile = Some(profile_name);
    }

    /// Set a value in the active profile
    ///
    /// # Errors
    ///
    /// Returns an error if no active profile is set, the key is unknown,
    /// or the value does not parse for that key
    pub fn set_profile_value(&mut self, key: &str, value: String) -> Result<()> {
        if matches!(key, "output-format" | "output_format") {
            if !matches!(value.as_str(), "human" | "json") {
                anyhow::bail!("Invalid output format: {value} (expected human or json)");
            }
            self.defaults.output_format = Some(value);
            return Ok(());
        }

        let profile_name = self
            .defaults
            .active_profile
            .as_ref()
            .context("No active profile set. Use 'config init' to create one.")?;

        let profile = self
            .profiles
            .get_mut(profile_name)
            .with_context(|| format!("Profile '{profile_name}' not found"))?;

        match key {
            "api-url" | "api_url" => profile.api_url = value,
            "link-url" | "link_url" => profile.link_url = Some(value),
            "link-timeout-secs" | "link_timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout '{value}': expected seconds"))?;
                if secs == 0 {
                    anyhow::bail!("Link timeout must be greater than 0 seconds");
                }
                profile.link_timeout_secs = Some(secs);
            }
            _ => anyhow::bail!("Unknown config key: {key}"),
        }

        Ok(())
    }

    /// Get a value from the active profile
    ///
    /// # Errors
    ///
    /// Returns an error if no active profile is set or key is unknown
    pub fn get_profile_value(&self, key: &str) -> Result<Option<String>> {
        if matches!(key, "output-format" | "output_format") {
            return Ok(self.defaults.output_format.clone());
        }

        let profile_name = self
            .defaults
            .active_profile
            .as_ref()
            .context("No active profile set")?;

        let profile = self
            .profiles
            .get(profile_name)
            .with_context(|| format!("Profile '{profile_name}' not found"))?;

        let value = match key {
            "api-url" | "api_url" => Some(profile.api_url.clone()),
            "link-url" | "link_url" => profile.link_url.clone(),
            "link-timeout-secs" | "link_timeout_secs" => {
                profile.link_timeout_secs.map(|s| s.to_string())
            }
            _ => anyhow::bail!("Unknown config key: {key}"),
        };

        Ok(value)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_config_has_default_profiles() {
        let config = ConfigFile::new();

        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.defaults.active_profile, Some("production".to_string()));
        assert!(config.profiles.contains_key("production"));
        assert!(config.profiles.contains_key("staging"));
        assert!(config.profiles.contains_key("local"));
    }

    #[test]
    fn test_active_profile() {
        let config = ConfigFile::new();
        let profile = config.active_profile().expect("Should have active profile");

        assert_eq!(profile.api_url, DEFAULT_API_URL);
        assert_eq!(profile.link_url.as_deref(), Some(DEFAULT_LINK_URL));
    }

    #[test]
    fn test_set_active_profile() {
        let mut config = ConfigFile::new();
        config.set_active_profile("local".to_string());

        let profile = config.active_profile().expect("Should have active profile");
        assert_eq!(profile.api_url, "http://127.0.0.1:8787");
        assert!(profile.link_url.is_none());
    }

    #[test]
    fn test_set_and_get_profile_value() {
        let mut config = ConfigFile::new();

        config
            .set_profile_value("api-url", "http://custom.api".to_string())
            .expect("Should set value");
        config
            .set_profile_value("link-timeout-secs", "300".to_string())
            .expect("Should set timeout");

        assert_eq!(
            config.get_profile_value("api-url").expect("Should get value"),
            Some("http://custom.api".to_string())
        );
        assert_eq!(
            config.get_profile_value("link_timeout_secs").expect("Should get value"),
            Some("300".to_string())
        );
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let mut config = ConfigFile::new();
        assert!(config
            .set_profile_value("link-timeout-secs", "soon".to_string())
            .is_err());
        assert!(config
            .set_profile_value("link-timeout-secs", "0".to_string())
            .is_err());
    }

    #[test]
    fn test_output_format_is_global() {
        let mut config = ConfigFile::new();
        config
            .set_profile_value("output-format", "json".to_string())
            .expect("Should set format");
        config.set_active_profile("staging".to_string());

        assert_eq!(
            config.get_profile_value("output-format").expect("Should get format"),
            Some("json".to_string())
        );
        assert!(config
            .set_profile_value("output-format", "yaml".to_string())
            .is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::new();
        config.set_active_profile("staging".to_string());
        config.save_to(&path).expect("Should save");

        let loaded = ConfigFile::load_from(&path).expect("Should load");
        assert_eq!(loaded.version, config.version);
        assert_eq!(loaded.defaults.active_profile, Some("staging".to_string()));
        assert_eq!(loaded.profiles, config.profiles);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let loaded =
            ConfigFile::load_from(&temp_dir.path().join("absent.toml")).expect("Should load");
        assert_eq!(loaded.profiles.len(), 3);
    }

    #[test]
    fn test_unknown_config_key_returns_error() {
        let mut config = ConfigFile::new();
        let result = config.set_profile_value("invalid-key", "value".to_string());

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown config key"));
    }
}
