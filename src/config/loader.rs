//! Configuration Loader
//!
//! Loads helper configuration from built-in defaults, `.env`, and JSON files.

use crate::config::settings::{HelperConfig, RetrySettings};
use crate::error::{ChatError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "AZURE_OPENAI_HELPER_CONFIG";

/// A config file; absent fields leave earlier values untouched
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    endpoint: Option<String>,
    api_key: Option<String>,
    endpoint_env: Option<String>,
    api_key_env: Option<String>,
    completion: Option<RetrySettings>,
    streaming: Option<RetrySettings>,
}

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    config: HelperConfig,
}

impl ConfigLoader {
    /// Load `.env`, then every config file found in the default locations
    pub fn new() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut loader = Self {
            config: HelperConfig::default(),
        };

        for path in Self::get_config_paths() {
            if path.exists() {
                loader.load_from_file(&path)?;
            }
        }

        Ok(loader)
    }

    /// Load defaults plus a single config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self {
            config: HelperConfig::default(),
        };
        loader.load_from_file(path)?;
        Ok(loader)
    }

    /// Config paths, lowest priority first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".azure-openai-helper").join("config.json"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("azure-openai-helper").join("config.json"));
        }

        paths.push(PathBuf::from("azure-openai-helper.json"));

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            ChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "loaded helper config");
        self.merge(file);
        Ok(())
    }

    /// Later files override earlier ones field by field
    fn merge(&mut self, file: ConfigFile) {
        let config = &mut self.config;
        if file.endpoint.is_some() {
            config.endpoint = file.endpoint;
        }
        if file.api_key.is_some() {
            config.api_key = file.api_key;
        }
        if let Some(env) = file.endpoint_env {
            config.endpoint_env = env;
        }
        if let Some(env) = file.api_key_env {
            config.api_key_env = env;
        }
        if let Some(settings) = file.completion {
            config.completion = settings;
        }
        if let Some(settings) = file.streaming {
            config.streaming = settings;
        }
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    pub fn into_config(self) -> HelperConfig {
        self.config
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config: HelperConfig::default(),
        })
    }
}
