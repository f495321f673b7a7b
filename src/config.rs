use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable overriding the configured backend URL.
pub const API_URL_ENV: &str = "NUTRICHAT_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api_url: Option<String>,
    pub default_diet: Option<String>,
    pub prompt_filename: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_url: None,
            default_diet: None,
            prompt_filename: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Backend base URL: environment variable first, then the config file,
    /// then the local development default.
    pub fn resolve_api_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn save_default_diet(diet: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_diet = Some(diet.to_string());
        config.save()
    }

    pub fn save_prompt_filename(prompt: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.prompt_filename = Some(prompt.to_string());
        config.save()
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("nutrichat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.api_url = Some("http://example.test:9000".to_string());
        config.default_diet = Some("GAPS".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url.as_deref(), Some("http://example.test:9000"));
        assert_eq!(loaded.default_diet.as_deref(), Some("GAPS"));
        assert!(loaded.prompt_filename.is_none());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.api_url.is_none());
        assert!(loaded.default_diet.is_none());
    }

    #[test]
    fn test_resolve_api_url_prefers_config_over_default() {
        let mut config = Config::new();
        assert_eq!(config.resolve_api_url(), DEFAULT_API_URL);

        config.api_url = Some("http://nutrichat.internal".to_string());
        assert_eq!(config.resolve_api_url(), "http://nutrichat.internal");
    }
}
