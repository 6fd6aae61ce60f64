//! Layered configuration for Switchboard.
//!
//! Precedence, highest first: CLI flags, environment variables (a `.env` file
//! in the working directory is loaded into the environment first), the
//! settings file at `~/.switchboard/config.toml`, built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use switchboard_mcp::LaunchSettings;
use switchboard_types::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Output budget for each model call.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct SwitchboardConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_base_url: String,
    pub max_retries: u32,
    pub servers: LaunchSettings,
    pub config_dir: PathBuf,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub servers: LaunchSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl SettingsFile {
    /// Read a settings file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Parse {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

impl SwitchboardConfig {
    /// Load configuration from the process environment and the settings file.
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring .env file: {e}");
            }
        }
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let config_dir = env("SWITCHBOARD_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_dir);
        let settings_path = config_dir.join("config.toml");
        let settings = SettingsFile::read(&settings_path)
            .unwrap_or_else(|e| {
                tracing::warn!("{e}; using defaults");
                None
            })
            .unwrap_or_default();

        let api_key = env("ANTHROPIC_API_KEY")
            .or(settings.api.api_key)
            .ok_or_else(|| ConfigError::MissingKey {
                key: "api_key (set ANTHROPIC_API_KEY or add it to ~/.switchboard/config.toml)"
                    .into(),
            })?;

        let model = overrides
            .model
            .or_else(|| env("SWITCHBOARD_MODEL"))
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_tokens = overrides
            .max_tokens
            .or(settings.api.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tokens".into(),
                message: "must be greater than zero".into(),
            });
        }

        let api_base_url = env("ANTHROPIC_API_BASE_URL")
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            api_key,
            model,
            max_tokens,
            api_base_url,
            max_retries: settings.api.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            servers: settings.servers,
            config_dir,
        })
    }
}

/// `~/.switchboard`, or `./.switchboard` when there is no home directory.
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}
