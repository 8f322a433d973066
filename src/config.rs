use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub telegram_bot_webhook_url: String,
    pub telegram_bot_token: Option<String>,
    /// The bot's own Telegram account; it must never be treated as a candidate.
    pub bot_telegram_id: Option<i64>,
    pub public_rps: u32,
    pub admin_rps: u32,
    pub page_leave_block_threshold: i32,
    pub submit_grace_seconds: i64,
    pub uploads_dir: String,
    pub stale_sweep_cron: Option<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let telegram_bot_token = get_env_opt("TELEGRAM_BOT_TOKEN");
        let bot_telegram_id = match get_env_opt("BOT_TELEGRAM_ID") {
            Some(raw) => Some(parse_value("BOT_TELEGRAM_ID", &raw)?),
            None => telegram_bot_token.as_deref().and_then(bot_id_from_token),
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            webhook_secret: get_env("WEBHOOK_SECRET")?,
            telegram_bot_webhook_url: get_env("TELEGRAM_BOT_WEBHOOK_URL")?,
            telegram_bot_token,
            bot_telegram_id,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            admin_rps: get_env_parse_or("ADMIN_RPS", 20)?,
            page_leave_block_threshold: get_env_parse_or("PAGE_LEAVE_BLOCK_THRESHOLD", 2)?,
            submit_grace_seconds: get_env_parse_or("SUBMIT_GRACE_SECONDS", 30)?,
            uploads_dir: get_env_opt("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string()),
            stale_sweep_cron: get_env_opt("STALE_SWEEP_CRON"),
            log_format: match get_env_opt("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }
}

/// Bot tokens look like `<bot id>:<secret>`.
pub fn bot_id_from_token(token: &str) -> Option<i64> {
    token.split_once(':').and_then(|(id, _)| id.parse().ok())
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_id_is_the_token_prefix() {
        assert_eq!(bot_id_from_token("123456:ABC-def"), Some(123456));
        assert_eq!(bot_id_from_token("not-a-token"), None);
        assert_eq!(bot_id_from_token("abc:def"), None);
    }
}
