use chrono_tz::Tz;
use secrecy::Secret;

use crate::lifecycle::{
    classifier::{
        DEFAULT_EXPIRING_HORIZON_DAYS, DEFAULT_RENEWAL_DUE_HORIZON_DAYS,
        DEFAULT_RENEWAL_EXCLUSION_HORIZON_DAYS,
    },
    AlertPolicy,
};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_TIMEZONE: &str = "Asia/Bangkok";
/// Every day at 09:00 in the configured time zone (sec min hour dom mon dow)
pub const DEFAULT_NOTIFICATION_CRON: &str = "0 0 9 * * *";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Telegram Bot API
    pub telegram_bot_token: Secret<String>,
    pub telegram_api_url: String,
    pub telegram_channel_id: String,
    pub telegram_webhook_secret: Option<Secret<String>>,

    // Security
    pub bot_password: Secret<String>,
    pub api_token: Secret<String>,

    // Scheduling
    pub timezone: Tz,
    pub notification_cron: String,
    pub http_timeout_secs: u64,

    pub alert_policy: AlertPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("Unknown time zone: {0}")]
    InvalidTimezone(String),

    #[error(transparent)]
    Policy(#[from] crate::lifecycle::LifecycleError),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_source(&config)
    }

    pub fn from_source(config: &config::Config) -> Result<Self, ConfigError> {
        let timezone_name = config
            .get_string("timezone")
            .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name.clone()))?;

        let alert_policy = AlertPolicy::new(
            get_or(config, "expiring_horizon_days", DEFAULT_EXPIRING_HORIZON_DAYS)?,
            get_or(config, "renewal_due_horizon_days", DEFAULT_RENEWAL_DUE_HORIZON_DAYS)?,
            get_or(
                config,
                "renewal_exclusion_horizon_days",
                DEFAULT_RENEWAL_EXCLUSION_HORIZON_DAYS,
            )?,
        )?;

        Ok(Self {
            database_url: config.get("database_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            telegram_bot_token: Secret::new(config.get("telegram_bot_token")?),
            telegram_api_url: config
                .get("telegram_api_url")
                .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string()),
            telegram_channel_id: config.get("telegram_channel_id")?,
            telegram_webhook_secret: config
                .get::<String>("telegram_webhook_secret")
                .ok()
                .map(Secret::new),

            bot_password: Secret::new(config.get("bot_password")?),
            api_token: Secret::new(config.get("api_token")?),

            timezone,
            notification_cron: config
                .get("notification_cron")
                .unwrap_or_else(|_| DEFAULT_NOTIFICATION_CRON.to_string()),
            http_timeout_secs: get_or(config, "http_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS)?,

            alert_policy,
        })
    }
}

/// Optional key: falls back to `default` when absent, fails when unparsable
fn get_or<'de, T: serde::Deserialize<'de>>(
    config: &config::Config,
    key: &str,
    default: T,
) -> Result<T, config::ConfigError> {
    match config.get::<T>(key) {
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        other => other,
    }
}
