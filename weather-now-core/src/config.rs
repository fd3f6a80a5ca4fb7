use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::warn;

use crate::error::ConfigError;

/// Environment variable (and `.env` key) holding the OpenWeatherMap API key.
pub const API_KEY_VAR: &str = "OWM_API_KEY";

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_ICON_URL: &str = "https://openweathermap.org/img/wn";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration stored on disk. Every field is optional.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// timeout_secs = 5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub weather_url: Option<String>,
    pub icon_url: Option<String>,
}

/// Fully resolved settings handed to the weather service at construction.
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub weather_url: String,
    pub icon_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("weather_url", &self.weather_url)
            .field("icon_url", &self.icon_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Defaults for everything except the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            icon_url: DEFAULT_ICON_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-now", "weather-now")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    /// Resolve the API key and produce the service settings.
    ///
    /// Key lookup order: `env_key` (the value of `OWM_API_KEY`), then the
    /// `.env` file at `dotenv_path`, then `api_key` from this config.
    pub fn service_config(
        &self,
        env_key: Option<String>,
        dotenv_path: &Path,
    ) -> Result<ServiceConfig, ConfigError> {
        let api_key = match non_blank(env_key) {
            Some(key) => key,
            None => match non_blank(read_dotenv_var(dotenv_path, API_KEY_VAR)) {
                Some(key) => key,
                None => non_blank(self.api_key.clone()).ok_or(ConfigError::MissingApiKey)?,
            },
        };

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let mut service = ServiceConfig::new(api_key);
        service.timeout = Duration::from_secs(timeout_secs);
        if let Some(url) = &self.weather_url {
            service.weather_url = url.clone();
        }
        if let Some(url) = &self.icon_url {
            service.icon_url = url.trim_end_matches('/').to_string();
        }

        Ok(service)
    }
}

/// Read `name` from a `KEY=value` file. A missing or unreadable file yields `None`.
pub fn read_dotenv_var(path: &Path, name: &str) -> Option<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable .env file");
            return None;
        }
    };

    parse_dotenv_var(&contents, name)
}

fn parse_dotenv_var(contents: &str, name: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| unquote(value.trim()).to_string())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
