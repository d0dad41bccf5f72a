use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the Telegram bot token
pub const ENV_BOT_TOKEN: &str = "TOKEN_BOT_TELEGRAM";
/// Environment variable overriding the answer API endpoint
pub const ENV_API_URL: &str = "API_SHAVIRA_URL";
/// Environment variable overriding the answer API bearer token
pub const ENV_API_AUTH_TOKEN: &str = "API_SHAVIRA_AUTHTOKEN";
/// Environment variable pointing at an alternative config file
pub const ENV_CONFIG_PATH: &str = "SHAVIRA_CONFIG";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TypingConfig {
    /// Delay between two "typing" chat actions
    #[serde(default = "default_typing_interval_ms")]
    pub interval_ms: u64,
}

impl TypingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_typing_interval_ms(),
        }
    }
}

/// User-facing texts. The defaults are the bot's Indonesian replies.
#[derive(Debug, Deserialize, Clone)]
pub struct MessagesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_server_error")]
    pub server_error: String,
    #[serde(default = "default_not_understood")]
    pub not_understood: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            server_error: default_server_error(),
            not_understood: default_not_understood(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_typing_interval_ms() -> u64 {
    1000
}

fn default_greeting() -> String {
    "Salam Harmoni🙏\nAku Shavira, ada yang bisa dibantu?".to_string()
}

fn default_server_error() -> String {
    "Terjadi kesalahan saat menghubungi server. Coba lagi nanti!".to_string()
}

fn default_not_understood() -> String {
    "Maaf, saya tidak dapat memahami pertanyaan Anda!".to_string()
}

impl Config {
    /// Load configuration from the optional TOML file and the process environment.
    ///
    /// The file is `$SHAVIRA_CONFIG` if set, otherwise `config.toml` when it exists.
    /// Environment variables always win over file values.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        let content = if explicit.is_some() || path.exists() {
            Some(read_config_file(&path)?)
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from file content plus an environment lookup.
    pub fn from_sources<F>(content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            config.telegram.bot_token = token;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api.url = url;
        }
        if let Some(token) = lookup(ENV_API_AUTH_TOKEN) {
            config.api.auth_token = token;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token is missing: set {} or [telegram] bot_token",
                ENV_BOT_TOKEN
            );
        }
        if self.api.url.trim().is_empty() {
            warn!(
                "Answer API URL is empty ({} or [api] url); every question will get the fallback reply",
                ENV_API_URL
            );
        }
        if self.typing.interval_ms == 0 {
            anyhow::bail!("[typing] interval_ms must be greater than zero");
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))
}
