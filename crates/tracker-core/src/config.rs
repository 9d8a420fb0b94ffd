//! Application configuration management.
//!
//! Two layers live here:
//! - `SessionConfig`: what the session manager needs to reach the API.
//! - `Config`: user preferences persisted at `~/.config/tracker/config.json`
//!   (API base URL and the last email used to log in).
//!
//! The API base URL is resolved from, in order, an explicit override, the
//! `TRACKER_API_BASE_URL` environment variable, and the config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "tracker";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the API base URL (e.g. `http://localhost:8000/api`)
pub const API_BASE_URL_ENV: &str = "TRACKER_API_BASE_URL";

/// Settings passed to the session manager at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_base_url: String,
}

impl SessionConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session snapshot, REPL history and logs.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the session config, preferring `override_url`, then the
    /// environment, then this file's `api_base_url`.
    pub fn session_config(&self, override_url: Option<&str>) -> Result<SessionConfig> {
        let from_env = std::env::var(API_BASE_URL_ENV).ok();
        self.resolve(override_url, from_env.as_deref())
    }

    fn resolve(&self, override_url: Option<&str>, from_env: Option<&str>) -> Result<SessionConfig> {
        let url = [override_url, from_env, self.api_base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "API base URL not configured; pass --api-base-url or set {}",
                    API_BASE_URL_ENV
                )
            })?;
        Ok(SessionConfig::new(url.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_override() {
        let config = Config {
            api_base_url: Some("http://file/api".to_string()),
            last_email: None,
        };
        let resolved = config
            .resolve(Some("http://flag/api"), Some("http://env/api"))
            .unwrap();
        assert_eq!(resolved.api_base_url, "http://flag/api");
    }

    #[test]
    fn test_resolve_env_then_file() {
        let config = Config {
            api_base_url: Some("http://file/api".to_string()),
            last_email: None,
        };
        assert_eq!(
            config.resolve(None, Some("http://env/api")).unwrap().api_base_url,
            "http://env/api"
        );
        assert_eq!(config.resolve(None, None).unwrap().api_base_url, "http://file/api");
    }

    #[test]
    fn test_resolve_strips_trailing_slash() {
        let config = Config::default();
        let resolved = config.resolve(Some("http://localhost:8000/api/"), None).unwrap();
        assert_eq!(resolved.api_base_url, "http://localhost:8000/api");
    }

    #[test]
    fn test_resolve_missing_is_error() {
        let config = Config::default();
        let err = config.resolve(None, Some("  ")).unwrap_err();
        assert!(err.to_string().contains(API_BASE_URL_ENV));

        // A blank variable does not hide the config file value
        let config = Config {
            api_base_url: Some("http://file/api".to_string()),
            last_email: None,
        };
        assert_eq!(config.resolve(None, Some("")).unwrap().api_base_url, "http://file/api");
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let missing = Config::load_from(&path).unwrap();
        assert!(missing.last_email.is_none());

        let config = Config {
            api_base_url: Some("http://localhost:8000/api".to_string()),
            last_email: Some("ada@example.com".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, config.api_base_url);
        assert_eq!(loaded.last_email, config.last_email);
    }
}
