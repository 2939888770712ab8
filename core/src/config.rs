use crate::errors::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the provider credential
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Application name used for the config directory
pub const APP_NAME: &str = "oceanfront";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are OceanFront AI, an oceanographic assistant specialized in Indian Ocean data.";

pub const DEFAULT_QUERY_SYSTEM_PROMPT: &str = "You are an AI data analyst that translates natural language into SQL queries for oceanographic Parquet data.";

/// Configuration struct for the chat relay
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RelayConfig {
    /// Credential for the provider. Usually left unset in the file and
    /// supplied through `GROQ_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub bind_addr: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub query_model: Option<String>,
    pub system_prompt: Option<String>,
    pub query_system_prompt: Option<String>,
    pub stream_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            bind_addr: Some("127.0.0.1:3000".to_string()),
            base_url: Some("https://api.groq.com/openai/v1".to_string()),
            model: Some("openai/gpt-oss-120b".to_string()),
            query_model: Some("mixtral-8x7b".to_string()),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            query_system_prompt: Some(DEFAULT_QUERY_SYSTEM_PROMPT.to_string()),
            stream_timeout_secs: Some(120),
            connect_timeout_secs: Some(10),
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ProviderResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ProviderError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                ProviderError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            // Fields missing from the file fall back to the defaults
            Ok(Self::default().merge(&config))
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the config from `~/.config/oceanfront/relay.toml`
    pub fn load_from_default() -> ProviderResult<Self> {
        Self::load_from_file(&get_default_config_file(APP_NAME)?)
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> ProviderResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            ProviderError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            ProviderError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            bind_addr: other.bind_addr.clone().or_else(|| self.bind_addr.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            model: other.model.clone().or_else(|| self.model.clone()),
            query_model: other
                .query_model
                .clone()
                .or_else(|| self.query_model.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            query_system_prompt: other
                .query_system_prompt
                .clone()
                .or_else(|| self.query_system_prompt.clone()),
            stream_timeout_secs: other.stream_timeout_secs.or(self.stream_timeout_secs),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
        }
    }

    /// Fills `api_key` from the environment when it is not already set.
    ///
    /// `.env` files are honoured; a blank variable counts as missing.
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            dotenvy::dotenv().ok();
            self.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn query_system_prompt(&self) -> &str {
        self.query_system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_QUERY_SYSTEM_PROMPT)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs.unwrap_or(120))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(10))
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> ProviderResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        ProviderError::ConfigError("Could not determine home directory".to_string())
    })?;

    let config_dir = home_dir.join(".config").join(app_name);

    Ok(config_dir)
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> ProviderResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("relay.toml"))
}
