//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URLs, redirect destinations, where the session is kept, and the
//! last used login name.
//!
//! Configuration is stored at `~/.config/signdesk/config.json`. Values from
//! the environment (`SIGNDESK_API_URL`, `SIGNDESK_AUTH_URL`,
//! `SIGNDESK_STORAGE`, optionally provided through a `.env` file) take
//! precedence over the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStore, StorageBackend};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "signdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:5000";

pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_DASHBOARD_PATH: &str = "/dashboard";
pub const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";

const ENV_API_URL: &str = "SIGNDESK_API_URL";
const ENV_AUTH_URL: &str = "SIGNDESK_AUTH_URL";
const ENV_STORAGE: &str = "SIGNDESK_STORAGE";

/// Where the session token and profile are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow!("Unknown storage kind: {}", other)),
        }
    }
}

/// Where a signed-in user without the required role is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForbiddenRedirect {
    #[default]
    Dashboard,
    Unauthorized,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub auth_url: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub forbidden_redirect: ForbiddenRedirect,
    pub login_path: Option<String>,
    pub dashboard_path: Option<String>,
    pub unauthorized_path: Option<String>,
    pub last_username: Option<String>,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            debug!(path = %path.display(), "Loaded config");
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay environment values. `lookup` is injected so tests do not touch
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(url) = lookup(ENV_AUTH_URL).filter(|v| !v.is_empty()) {
            self.auth_url = Some(url);
        }
        if let Some(kind) = lookup(ENV_STORAGE).filter(|v| !v.is_empty()) {
            self.storage = kind.parse()?;
        }
        Ok(())
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Account endpoints live under the API unless configured separately.
    pub fn auth_url(&self) -> String {
        self.auth_url
            .clone()
            .unwrap_or_else(|| format!("{}/api/auth", self.api_url()))
    }

    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH)
    }

    pub fn dashboard_path(&self) -> &str {
        self.dashboard_path.as_deref().unwrap_or(DEFAULT_DASHBOARD_PATH)
    }

    pub fn unauthorized_path(&self) -> &str {
        self.unauthorized_path
            .as_deref()
            .unwrap_or(DEFAULT_UNAUTHORIZED_PATH)
    }

    pub fn forbidden_path(&self) -> &str {
        match self.forbidden_redirect {
            ForbiddenRedirect::Dashboard => self.dashboard_path(),
            ForbiddenRedirect::Unauthorized => self.unauthorized_path(),
        }
    }

    /// Open the session store selected by `storage`.
    pub fn session_store(&self) -> Result<SessionStore> {
        let backend: Arc<dyn StorageBackend> = match self.storage {
            StorageKind::File => Arc::new(FileStorage::new(&self.cache_dir()?)),
            StorageKind::Keyring => Arc::new(KeyringStorage::new()),
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(SessionStore::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url(), "http://localhost:5000");
        assert_eq!(config.auth_url(), "http://localhost:5000/api/auth");
        assert_eq!(config.login_path(), "/auth/login");
        assert_eq!(config.forbidden_path(), "/dashboard");
        assert_eq!(config.storage, StorageKind::File);
    }

    #[test]
    fn test_forbidden_redirect_unauthorized() {
        let config = Config {
            forbidden_redirect: ForbiddenRedirect::Unauthorized,
            ..Default::default()
        };
        assert_eq!(config.forbidden_path(), "/unauthorized");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SIGNDESK_API_URL", "https://support.example.com/"),
            ("SIGNDESK_STORAGE", "Keyring"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_url(), "https://support.example.com");
        assert_eq!(config.auth_url(), "https://support.example.com/api/auth");
        assert_eq!(config.storage, StorageKind::Keyring);
    }

    #[test]
    fn test_env_rejects_unknown_storage() {
        let mut config = Config::default();
        assert!(config
            .apply_env(|key| (key == "SIGNDESK_STORAGE").then(|| "cloud".to_string()))
            .is_err());
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "https://signs.example.com", "storage": "memory", "forbidden_redirect": "unauthorized"}"#,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url(), "https://signs.example.com");
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.forbidden_redirect, ForbiddenRedirect::Unauthorized);
    }
}
