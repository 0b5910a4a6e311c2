use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const API_BASE_ENV: &str = "RAG_API_BASE";

const APP_DIR: &str = "rag-chat";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Pick the backend URL: explicit override (CLI flag or `RAG_API_BASE`,
    /// both handled by clap), then the config file, then the local default.
    pub fn resolve_api_base(&self, override_base: Option<&str>) -> String {
        let base = override_base
            .filter(|s| !s.trim().is_empty())
            .or(self.api_base.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or(DEFAULT_API_BASE);

        normalize_base(base)
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(app_config_dir()?.join("config.json"))
    }
}

/// `<config>/rag-chat`, shared with the credential store.
pub fn app_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;

    Ok(config_dir.join(APP_DIR))
}

/// `<data-local>/rag-chat`, where the UI writes its log file.
pub fn app_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join(APP_DIR))
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_base_when_unset() {
        let config = Config::new();
        assert_eq!(config.resolve_api_base(None), DEFAULT_API_BASE);
    }

    #[test]
    fn test_override_wins_over_file() {
        let config = Config {
            api_base: Some("http://from-file:9000".to_string()),
        };
        assert_eq!(
            config.resolve_api_base(Some("http://flag:1234/")),
            "http://flag:1234"
        );
        assert_eq!(config.resolve_api_base(None), "http://from-file:9000");
    }

    #[test]
    fn test_blank_values_fall_through() {
        let config = Config {
            api_base: Some("   ".to_string()),
        };
        assert_eq!(config.resolve_api_base(Some("")), DEFAULT_API_BASE);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_base: Some("http://rag.internal:8000".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
