//! Config file operations command handlers
//!
//! Every handler takes the config file path so `main` resolves it once.

use crate::config_file::{ConfigFile, ProfileConfig};
use crate::utils::colors::Theme;
use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;

/// Initialize a new config file
///
/// # Errors
///
/// Returns an error if the config file already exists (unless `force` is true),
/// or if the file cannot be created or written
pub fn init(config_path: &Path, force: bool) -> Result<String> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\n\
             Use --force to overwrite",
            config_path.display()
        );
    }

    let config = ConfigFile::new();
    config.save_to(config_path)?;

    let mut output = String::new();
    writeln!(
        &mut output,
        "{} Config file initialized at: {}",
        Theme::success("✓"),
        Theme::value(&config_path.display().to_string())
    )?;
    writeln!(&mut output)?;
    writeln!(&mut output, "{}", Theme::header("Default profiles created:"))?;
    for name in config.profiles.keys() {
        if config.defaults.active_profile.as_deref() == Some(name.as_str()) {
            writeln!(
                &mut output,
                "  {} {}",
                Theme::dim("•"),
                Theme::success(&format!("{name} (active)"))
            )?;
        } else {
            writeln!(&mut output, "  {} {name}", Theme::dim("•"))?;
        }
    }
    writeln!(&mut output)?;
    write!(
        &mut output,
        "{}",
        Theme::dim("Use 'checkclaw config set <key> <value>' to customize")
    )?;
    Ok(output)
}

/// List all configuration values of a profile
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or if the specified profile is not found
pub fn list(config_path: &Path, profile_name: Option<&str>) -> Result<String> {
    let config = ConfigFile::load_from(config_path)?;

    let profile = if let Some(name) = profile_name {
        config
            .get_profile(name)
            .with_context(|| format!("Profile '{name}' not found"))?
    } else {
        config
            .active_profile()
            .context("No active profile set. Run 'checkclaw config init'")?
    };

    let display_name = profile_name
        .map(String::from)
        .or_else(|| config.defaults.active_profile.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let mut output = String::new();
    writeln!(
        &mut output,
        "{} (profile: {})",
        Theme::header("Configuration"),
        Theme::highlight(&display_name)
    )?;
    writeln!(&mut output, "{}", Theme::dim(&"=".repeat(50)))?;
    writeln!(
        &mut output,
        "{:<15} {}",
        Theme::info("API URL:"),
        Theme::value(&profile.api_url)
    )?;
    writeln!(
        &mut output,
        "{:<15} {}",
        Theme::info("Link URL:"),
        profile
            .link_url
            .as_deref()
            .map_or_else(|| Theme::dim("(default)"), Theme::value)
    )?;
    writeln!(
        &mut output,
        "{:<15} {}",
        Theme::info("Link timeout:"),
        profile.link_timeout_secs.map_or_else(
            || Theme::dim("(default)"),
            |secs| Theme::value(&format!("{secs}s"))
        )
    )?;
    write!(
        &mut output,
        "{:<15} {}",
        Theme::info("Output:"),
        Theme::value(config.defaults.output_format.as_deref().unwrap_or("human"))
    )?;

    Ok(output)
}

/// Run `f` against `profile_name` (or the active profile), then restore the active profile
fn with_profile<T>(
    config: &mut ConfigFile,
    profile_name: Option<&str>,
    f: impl FnOnce(&mut ConfigFile) -> Result<T>,
) -> Result<T> {
    let original_active = config.defaults.active_profile.clone();
    if let Some(name) = profile_name {
        if config.get_profile(name).is_none() {
            anyhow::bail!("Profile '{name}' not found");
        }
        config.set_active_profile(name.to_string());
    }

    let result = f(config);

    if let Some(original) = original_active {
        config.set_active_profile(original);
    }
    result
}

/// Get a specific configuration value
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded, the profile is not found, or the key is invalid
pub fn get(config_path: &Path, key: &str, profile_name: Option<&str>) -> Result<String> {
    let mut config = ConfigFile::load_from(config_path)?;
    let value = with_profile(&mut config, profile_name, |c| c.get_profile_value(key))?;
    Ok(value.unwrap_or_else(|| "(not set)".to_string()))
}

/// Set a configuration value
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or saved, the profile is not found, or the key is invalid
pub fn set(config_path: &Path, key: &str, value: &str, profile_name: Option<&str>) -> Result<String> {
    let mut config = ConfigFile::load_from(config_path)?;
    with_profile(&mut config, profile_name, |c| {
        c.set_profile_value(key, value.to_string())
    })?;
    config.save_to(config_path)?;

    let profile_display = profile_name
        .map(String::from)
        .or(config.defaults.active_profile)
        .unwrap_or_else(|| "unknown".to_string());

    Ok(format!(
        "{} Set {} = {} (profile: {})",
        Theme::success("✓"),
        Theme::info(key),
        Theme::value(value),
        Theme::highlight(&profile_display)
    ))
}

/// Show config file path
#[must_use]
pub fn path(config_path: &Path) -> String {
    config_path.display().to_string()
}

/// List all available profiles
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded
pub fn list_profiles(config_path: &Path) -> Result<String> {
    let config = ConfigFile::load_from(config_path)?;
    let active_profile = config.defaults.active_profile.as_deref();

    let mut output = String::new();
    writeln!(&mut output, "{}", Theme::header("Available Profiles:"))?;
    write!(&mut output, "{}", Theme::dim(&"=".repeat(50)))?;

    for (name, profile) in &config.profiles {
        let name_display = if active_profile == Some(name.as_str()) {
            format!("{} {}", Theme::highlight(name), Theme::success("(active)"))
        } else {
            Theme::value(name).to_string()
        };

        writeln!(&mut output)?;
        writeln!(&mut output)?;
        writeln!(&mut output, "{name_display}")?;
        write!(&mut output, "  {}: {}", Theme::dim("API URL"), profile.api_url)?;
        if let Some(ref link_url) = profile.link_url {
            write!(&mut output, "\n  {}: {link_url}", Theme::dim("Link URL"))?;
        }
    }

    Ok(output)
}

/// Show active profile name
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded
pub fn show_active_profile(config_path: &Path) -> Result<String> {
    let config = ConfigFile::load_from(config_path)?;
    Ok(config
        .defaults
        .active_profile
        .unwrap_or_else(|| "(none)".to_string()))
}

/// Set active profile
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or saved, or if the specified profile does not exist
pub fn use_profile(config_path: &Path, profile_name: &str) -> Result<String> {
    let mut config = ConfigFile::load_from(config_path)?;

    if !config.profiles.contains_key(profile_name) {
        anyhow::bail!(
            "Profile '{profile_name}' not found.\n\
             \n\
             Available profiles:\n  {}\n\
             \n\
             Use 'checkclaw config profile create' to create a new profile",
            config
                .profiles
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n  ")
        );
    }

    config.set_active_profile(profile_name.to_string());
    config.save_to(config_path)?;

    Ok(format!(
        "{} Active profile set to: {}",
        Theme::success("✓"),
        Theme::highlight(profile_name)
    ))
}

/// Create a new profile
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or saved, or if a profile with the same name already exists
pub fn create_profile(
    config_path: &Path,
    name: &str,
    api_url: &str,
    link_url: Option<&str>,
    link_timeout_secs: Option<u64>,
) -> Result<String> {
    let mut config = ConfigFile::load_from(config_path)?;

    if config.profiles.contains_key(name) {
        anyhow::bail!(
            "Profile '{name}' already exists.\n\
             Use 'checkclaw config set' to modify existing profiles"
        );
    }
    if link_timeout_secs == Some(0) {
        anyhow::bail!("Link timeout must be greater than 0 seconds");
    }

    config.profiles.insert(
        name.to_string(),
        ProfileConfig {
            api_url: api_url.to_string(),
            link_url: link_url.map(String::from),
            link_timeout_secs,
        },
    );
    config.save_to(config_path)?;

    let mut output = String::new();
    writeln!(
        &mut output,
        "{} Profile '{}' created with:",
        Theme::success("✓"),
        Theme::highlight(name)
    )?;
    writeln!(&mut output, "  {} API URL: {}", Theme::dim("•"), Theme::value(api_url))?;
    if let Some(link_url) = link_url {
        writeln!(&mut output, "  {} Link URL: {}", Theme::dim("•"), Theme::value(link_url))?;
    }
    writeln!(&mut output)?;
    write!(
        &mut output,
        "{}",
        Theme::dim(&format!("Use 'checkclaw config profile use {name}' to activate"))
    )?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("checkclaw").join("config.toml")
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        let output = init(&path, false).unwrap();
        assert!(output.contains("production (active)"));
        assert!(path.exists());

        let err = init(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(init(&path, true).is_ok());
    }

    #[test]
    fn test_set_then_get_on_named_profile() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        let output = set(&path, "api-url", "http://127.0.0.1:9000", Some("local")).unwrap();
        assert!(output.contains("(profile: local)"));

        assert_eq!(
            get(&path, "api-url", Some("local")).unwrap(),
            "http://127.0.0.1:9000"
        );
        assert_eq!(get(&path, "api-url", None).unwrap(), crate::config::DEFAULT_API_URL);
        assert_eq!(show_active_profile(&path).unwrap(), "production");
        assert_eq!(get(&path, "link-timeout-secs", None).unwrap(), "(not set)");
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        assert!(get(&path, "api-url", Some("nope")).is_err());
        assert!(list(&path, Some("nope")).is_err());
        assert!(use_profile(&path, "nope")
            .unwrap_err()
            .to_string()
            .contains("staging"));
    }

    #[test]
    fn test_create_and_use_profile() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        create_profile(&path, "dev", "http://localhost:3000", None, Some(30)).unwrap();
        assert!(create_profile(&path, "dev", "http://localhost:3000", None, None).is_err());

        use_profile(&path, "dev").unwrap();
        assert_eq!(show_active_profile(&path).unwrap(), "dev");

        let listing = list(&path, None).unwrap();
        assert!(listing.contains("http://localhost:3000"));
        assert!(listing.contains("30s"));
        assert!(list_profiles(&path).unwrap().contains("dev (active)"));
    }

    #[test]
    fn test_path_is_displayed() {
        let dir = TempDir::new().unwrap();
        assert!(path(&config_path(&dir)).ends_with("config.toml"));
    }
}
