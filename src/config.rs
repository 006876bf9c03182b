//! Environment configuration

use std::env;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("PORT must be a number, got {0:?}")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub notion_api_key: String,
    pub notion_expenses_db_id: String,
    /// Webhook URL for outbound gateway messages.
    pub gateway_send_url: String,
    pub gateway_token: Option<String>,
    /// Empty list admits every channel.
    pub allowed_channel_ids: Vec<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: require("GEMINI_API_KEY")?,
            notion_api_key: require("NOTION_API_KEY")?,
            notion_expenses_db_id: require("NOTION_EXPENSES_DB_ID")?,
            gateway_send_url: require("GATEWAY_SEND_URL")?,
            gateway_token: env::var("GATEWAY_TOKEN").ok().filter(|v| !v.is_empty()),
            allowed_channel_ids: env::var("ALLOWED_CHANNEL_IDS")
                .map(|raw| split_channel_ids(&raw))
                .unwrap_or_default(),
            port: match env::var("PORT") {
                Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
                Err(_) => DEFAULT_PORT,
            },
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn split_channel_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
