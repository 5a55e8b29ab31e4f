use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::db::{infer_backend_type, BackendType};
use crate::store::STORAGE_KEY;

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "sae";

/// Settings for the wizard, stored as YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Location of the durable slot: a directory for the file backend or a `.db` file
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Explicit backend; inferred from `data_path` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,

    /// Slot key holding the project document
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            backend: None,
            storage_key: default_storage_key(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_storage_key() -> String {
    STORAGE_KEY.to_string()
}

fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl AppConfig {
    /// Loads the config from `path`; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Creates a default config file if it doesn't exist
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        if path.as_ref().exists() {
            return Ok(());
        }
        Self::default().save(path)
    }

    /// The backend in effect, explicit or inferred from the data path
    pub fn backend_type(&self) -> BackendType {
        self.backend
            .unwrap_or_else(|| infer_backend_type(&self.data_path))
    }
}

/// Gets the config directory (~/.config/sae on Linux)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join(APP_DIR))
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    // SAE_CONFIG overrides the platform location
    if let Ok(path) = std::env::var("SAE_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    Ok(get_config_dir()?.join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load(dir.path().join("config.yaml"))?;
        assert_eq!(config.storage_key, STORAGE_KEY);
        assert_eq!(config.backend_type(), BackendType::File);
        assert_eq!(config.cache.version, CacheConfig::default().version);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_fills_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "data_path: /tmp/sae/state.db\ncache:\n  version: sae-pwa-cache-v2\n",
        )?;

        let config = AppConfig::load(&path)?;
        assert_eq!(config.data_path, PathBuf::from("/tmp/sae/state.db"));
        assert_eq!(config.backend_type(), BackendType::Sqlite);
        assert_eq!(config.cache.version, "sae-pwa-cache-v2");
        assert_eq!(config.cache.entry_document, "./index.html");
        assert_eq!(config.storage_key, STORAGE_KEY);
        Ok(())
    }

    #[test]
    fn test_create_default_and_reload() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.yaml");

        AppConfig::create_default(&path)?;
        let loaded = AppConfig::load(&path)?;
        assert_eq!(loaded, AppConfig::default());
        Ok(())
    }

    #[test]
    fn test_explicit_backend_wins() {
        let config = AppConfig {
            data_path: PathBuf::from("state.db"),
            backend: Some(BackendType::File),
            ..AppConfig::default()
        };
        assert_eq!(config.backend_type(), BackendType::File);
    }
}
