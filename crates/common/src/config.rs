use std::str::FromStr;
use std::time::Duration;

use crate::{Error, OverlapPolicy, Result};

/// All configuration loaded from environment variables at startup.
///
/// Only `DASHBOARD_TOKEN` is required. Every delivery channel and data
/// provider is optional; a missing credential disables that capability
/// rather than failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Storage
    pub database_url: String,

    // Watchlist / schedule / scoring file
    pub watchlist_path: String,

    // Market data
    /// Candidate order for the data-source chain, e.g. `["okx", "binance", "tushare"]`.
    pub data_sources: Vec<String>,
    pub tushare_token: Option<String>,
    pub candle_limit: usize,
    pub http_timeout: Duration,

    // Advisor
    pub deepseek_api_key: Option<String>,
    pub deepseek_base_url: String,
    pub deepseek_model: String,

    // Scheduling
    pub overlap_policy: OverlapPolicy,

    // Notification channels
    pub email: EmailConfig,
    pub ntfy: NtfyConfig,
    pub wecom: WeComConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NtfyConfig {
    pub enabled: bool,
    pub base_url: String,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WeComConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub allowed_user_ids: Vec<i64>,
    /// Send trading signals to the allowed chats, not just answer commands.
    pub notify_enabled: bool,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let data_sources = optional_env("DATA_SOURCES")
            .unwrap_or_else(|| "okx,binance,tushare".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let telegram_allowed_user_ids = match optional_env("TELEGRAM_ALLOWED_USER_IDS") {
            Some(raw) => parse_user_ids(&raw)?,
            None => Vec::new(),
        };

        Ok(Config {
            dashboard_token: required_env("DASHBOARD_TOKEN")?,
            dashboard_port: parse_env("DASHBOARD_PORT", 8080)?,
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/pulsebot.db?mode=rwc".to_string()),
            watchlist_path: optional_env("WATCHLIST_PATH")
                .unwrap_or_else(|| "config/watchlist.toml".to_string()),
            data_sources,
            tushare_token: optional_env("TUSHARE_TOKEN"),
            candle_limit: parse_env("CANDLE_LIMIT", 100)?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?),
            deepseek_api_key: optional_env("DEEPSEEK_API_KEY"),
            deepseek_base_url: optional_env("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|| "https://api.deepseek.com".to_string()),
            deepseek_model: optional_env("DEEPSEEK_MODEL")
                .unwrap_or_else(|| "deepseek-chat".to_string()),
            overlap_policy: parse_env("OVERLAP_POLICY", OverlapPolicy::Skip)?,
            email: EmailConfig {
                enabled: flag_env("ENABLE_EMAIL_NOTIFICATION"),
                smtp_host: optional_env("SMTP_HOST"),
                smtp_user: optional_env("SMTP_USER"),
                smtp_pass: optional_env("SMTP_PASS"),
                to: optional_env("NOTIFICATION_EMAIL_TO"),
            },
            ntfy: NtfyConfig {
                enabled: flag_env("ENABLE_NTFY_NOTIFICATION"),
                base_url: optional_env("NTFY_BASE_URL")
                    .unwrap_or_else(|| "https://ntfy.sh".to_string()),
                topic: optional_env("NTFY_TOPIC"),
            },
            wecom: WeComConfig {
                enabled: flag_env("ENABLE_WECOM_NOTIFICATION"),
                webhook_url: optional_env("WECOM_WEBHOOK_URL"),
            },
            telegram: TelegramConfig {
                token: optional_env("TELEGRAM_TOKEN"),
                allowed_user_ids: telegram_allowed_user_ids,
                notify_enabled: flag_env("ENABLE_TELEGRAM_NOTIFICATION"),
            },
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        Error::Config(format!(
            "required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

/// Unset and blank are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag_env(key: &str) -> bool {
    optional_env(key).map(|v| parse_flag(&v)).unwrap_or(false)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("{key} has invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}

pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

pub(crate) fn parse_user_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                Error::Config(format!(
                    "TELEGRAM_ALLOWED_USER_IDS contains non-numeric ID: '{s}'"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("enabled-ish"));
    }

    #[test]
    fn user_ids_parse_and_reject_garbage() {
        assert_eq!(parse_user_ids("1, 2,3,").unwrap(), vec![1, 2, 3]);
        assert!(matches!(parse_user_ids("1,abc"), Err(Error::Config(_))));
    }
}
