//! Stored API credentials
//!
//! Credentials live in `credentials.toml` next to the config file and are
//! written with owner-only permissions on unix. They are loaded once in `main`
//! and handed to the API client explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_file::ConfigFile;

/// How requests are authenticated
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_type", content = "secret", rename_all = "lowercase")]
pub enum Credentials {
    /// `Authorization: Bearer <key>`
    #[serde(rename = "apikey")]
    ApiKey(String),
    /// `Cookie: <pairs>` captured from a previous response
    Session(String),
}

impl Credentials {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "apikey",
            Self::Session(_) => "session",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials::{}(<redacted>)", self.kind())
    }
}

/// On-disk credential file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<Credentials>,
}

/// Loads and persists [`Credentials`]
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at the default location (`~/.config/checkclaw/credentials.toml`)
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(ConfigFile::config_dir()?.join("credentials.toml")))
    }

    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored credentials, `None` when logged out
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials: {}", self.path.display()))?;
        let file: CredentialFile = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials: {}", self.path.display()))?;
        Ok(file.auth.filter(|c| match c {
            Credentials::ApiKey(s) | Credentials::Session(s) => !s.is_empty(),
        }))
    }

    /// Replace stored credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        self.write(&CredentialFile {
            auth: Some(credentials.clone()),
        })
    }

    /// Forget stored credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove credentials: {}", self.path.display())
            })?;
        }
        Ok(())
    }

    fn write(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(file).context("Failed to serialize credentials")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write credentials: {}", self.path.display()))?;
        restrict_permissions(&self.path)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_means_logged_out() {
        let dir = TempDir::new().expect("temp dir");
        let store = CredentialStore::at(dir.path().join("credentials.toml"));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_save_load_and_clear() {
        let dir = TempDir::new().expect("temp dir");
        let store = CredentialStore::at(dir.path().join("credentials.toml"));

        store
            .save(&Credentials::ApiKey("ck_live_123".to_string()))
            .expect("save");
        assert_eq!(
            store.load().expect("load"),
            Some(Credentials::ApiKey("ck_live_123".to_string()))
        );

        store
            .save(&Credentials::Session("sid=abc".to_string()))
            .expect("save");
        assert_eq!(
            store.load().expect("load"),
            Some(Credentials::Session("sid=abc".to_string()))
        );

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        store.clear().expect("clearing twice is fine");
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("temp dir");
        let store = CredentialStore::at(dir.path().join("credentials.toml"));
        store
            .save(&Credentials::ApiKey("secret".to_string()))
            .expect("save");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credentials::ApiKey("ck_live_123".to_string()));
        assert!(!rendered.contains("ck_live_123"));
        assert!(rendered.contains("apikey"));
    }
}
