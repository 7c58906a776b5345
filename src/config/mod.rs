use crate::{job::JobSettings, media::FormatSelector};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1_950_000_000;
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 2500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOT_TOKEN env var not set and no bot.token in the config file")]
    MissingToken,

    #[error("invalid bot.api_url {url:?}: {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("invalid download.default_format {0:?}")]
    InvalidFormat(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BotConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_upload_bytes: u64,
    pub progress_interval_ms: u64,
    pub work_dir: Option<PathBuf>,
    pub ytdlp_path: String,
    pub retries: u32,
    pub ask_format: bool,
    pub default_format: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            work_dir: None,
            ytdlp_path: "yt-dlp".to_string(),
            retries: 3,
            ask_format: false,
            default_format: "best".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub bot: BotConfig,
    pub download: DownloadConfig,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn get_bot_token(&self) -> Option<&str> {
        self.bot
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Validated runtime settings.
pub struct Settings {
    pub token: String,
    pub api_url: Option<Url>,
    pub max_upload_bytes: u64,
    pub progress_interval: Duration,
    pub work_dir: PathBuf,
    pub ytdlp_path: String,
    pub retries: u32,
    pub ask_format: bool,
    pub default_format: FormatSelector,
}

impl Settings {
    /// Combines the config file with the `BOT_TOKEN` environment value, which wins.
    pub fn resolve(config: &Config, env_token: Option<String>) -> Result<Self, ConfigError> {
        let token = env_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| config.get_bot_token().map(str::to_string))
            .ok_or(ConfigError::MissingToken)?;

        let api_url = config
            .bot
            .api_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|source| ConfigError::InvalidApiUrl {
                    url: url.to_string(),
                    source,
                })
            })
            .transpose()?;

        let download = &config.download;
        let default_format = download
            .default_format
            .parse()
            .map_err(|_| ConfigError::InvalidFormat(download.default_format.clone()))?;

        Ok(Self {
            token,
            api_url,
            max_upload_bytes: download.max_upload_bytes,
            progress_interval: Duration::from_millis(download.progress_interval_ms),
            work_dir: download.work_dir.clone().unwrap_or_else(std::env::temp_dir),
            ytdlp_path: download.ytdlp_path.clone(),
            retries: download.retries,
            ask_format: download.ask_format,
            default_format,
        })
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            min_interval: self.progress_interval,
            max_upload_bytes: self.max_upload_bytes,
            work_dir: self.work_dir.clone(),
        }
    }
}
