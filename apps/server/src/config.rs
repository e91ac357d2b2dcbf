//! Application configuration.

use chrono::NaiveTime;
use pricebot_core::Symbol;
use pricebot_feeds::DEFAULT_FETCH_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BOT_TOKEN is not set")]
    MissingToken,
    #[error("Invalid digest time {0:?}, expected HH:MM")]
    InvalidDigestTime(String),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Snapshot file path.
    pub data_file: PathBuf,
    /// Seconds between alert sweeps.
    pub sweep_interval_secs: u64,
    /// Local time of the daily digest.
    pub digest_time: NaiveTime,
    /// Upper bound on a single upstream request.
    pub fetch_timeout_secs: u64,
    /// Symbols included in the digest and market overview.
    pub watch_list: Vec<Symbol>,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("user_data.json"),
            sweep_interval_secs: 120,
            digest_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            watch_list: ["BTC", "ETH", "LTC"].into_iter().map(Symbol::new).collect(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("sweep interval"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval("fetch timeout"));
        }
        Ok(())
    }
}

/// Parse a digest time given as `HH:MM` (or `HH:MM:SS`).
pub fn parse_digest_time(value: &str) -> Result<NaiveTime, ConfigError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidDigestTime(value.to_string()))
}

/// Read the bot token, treating an empty value as missing.
pub fn bot_token_from_env() -> Result<String, ConfigError> {
    bot_token(std::env::var(BOT_TOKEN_ENV).ok())
}

fn bot_token(value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(ConfigError::MissingToken)
}
