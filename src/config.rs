use std::env;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

fn get_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_env_string(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

fn get_env_required(key: &str) -> Result<String> {
    get_env(key).ok_or_else(|| anyhow!("{key} is required"))
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u64>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_usize(key: &str, default: usize) -> Result<usize> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<usize>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_i64_opt(key: &str) -> Result<Option<i64>> {
    match get_env(key) {
        None => Ok(None),
        Some(v) => Ok(Some(
            v.parse::<i64>()
                .map_err(|e| anyhow!("{key} invalid int: {e}"))?,
        )),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Chat surface
    pub telegram_bot_token: String,
    pub telegram_api_base: String,
    pub telegram_admin_id: Option<i64>,
    pub telegram_poll_timeout_secs: u64,

    // Market data providers
    pub coingecko_base_url: String,
    pub cmc_base_url: String,
    pub cmc_api_key: String,
    pub cmc_trending_url: String,
    pub cmc_trending_limit: usize,
    pub http_timeout_secs: u64,

    // Poll / storage
    pub sqlite_path: String,
    pub draw_sample_size: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let s = Self {
            telegram_bot_token: get_env_required("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base: get_env_string("TELEGRAM_API_BASE", "https://api.telegram.org"),
            telegram_admin_id: get_env_i64_opt("TELEGRAM_ADMIN_ID")?,
            telegram_poll_timeout_secs: get_env_u64("TELEGRAM_POLL_TIMEOUT_SECS", 30)?,
            coingecko_base_url: get_env_string(
                "COINGECKO_BASE_URL",
                "https://api.coingecko.com/api/v3",
            ),
            cmc_base_url: get_env_string("CMC_BASE_URL", "https://pro-api.coinmarketcap.com"),
            cmc_api_key: get_env_required("COIN_MARKET_CAP_API_KEY")?,
            cmc_trending_url: get_env_string(
                "CMC_TRENDING_URL",
                "https://coinmarketcap.com/trending-cryptocurrencies",
            ),
            cmc_trending_limit: get_env_usize("CMC_TRENDING_LIMIT", 7)?,
            http_timeout_secs: get_env_u64("HTTP_TIMEOUT_SECS", 30)?,
            sqlite_path: get_env_string("SQLITE_PATH", "./data/marketbot.sqlite"),
            draw_sample_size: get_env_usize("DRAW_SAMPLE_SIZE", 10)?,
        };

        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs < 1 {
            return Err(anyhow!(
                "HTTP_TIMEOUT_SECS must be >= 1 (got {})",
                self.http_timeout_secs
            ));
        }
        // Telegram rejects long polls over 50 seconds.
        if !(1..=50).contains(&self.telegram_poll_timeout_secs) {
            return Err(anyhow!(
                "TELEGRAM_POLL_TIMEOUT_SECS must be in 1..=50 (got {})",
                self.telegram_poll_timeout_secs
            ));
        }
        if self.cmc_trending_limit < 1 {
            return Err(anyhow!(
                "CMC_TRENDING_LIMIT must be >= 1 (got {})",
                self.cmc_trending_limit
            ));
        }
        if self.draw_sample_size < 1 {
            return Err(anyhow!(
                "DRAW_SAMPLE_SIZE must be >= 1 (got {})",
                self.draw_sample_size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            telegram_bot_token: "token".into(),
            telegram_api_base: "https://api.telegram.org".into(),
            telegram_admin_id: None,
            telegram_poll_timeout_secs: 30,
            coingecko_base_url: "https://api.coingecko.com/api/v3".into(),
            cmc_base_url: "https://pro-api.coinmarketcap.com".into(),
            cmc_api_key: "key".into(),
            cmc_trending_url: "https://coinmarketcap.com/trending-cryptocurrencies".into(),
            cmc_trending_limit: 7,
            http_timeout_secs: 30,
            sqlite_path: ":memory:".into(),
            draw_sample_size: 10,
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn over_long_telegram_poll_is_rejected() {
        let mut s = base_settings();
        s.telegram_poll_timeout_secs = 120;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_sample_size_is_rejected() {
        let mut s = base_settings();
        s.draw_sample_size = 0;
        assert!(s.validate().is_err());
    }
}
