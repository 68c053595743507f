use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const API_KEY_ENV: &str = "FXDESK_API_KEY";

fn default_base_url() -> String {
    "https://api.currencybeacon.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// API key from the config file, else from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(API_KEY_ENV).with_context(|| {
            format!("No API key configured. Set provider.api_key or {API_KEY_ENV}")
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConverterConfig {
    pub from: String,
    pub to: String,
    pub amount: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            from: "USD".to_string(),
            to: "EUR".to_string(),
            amount: "1000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            base_currency: default_base_currency(),
            debounce_ms: default_debounce_ms(),
            converter: ConverterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or defaults if there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxdesk", "fxdesk")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
