use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub environment: Environment,
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub refresh_debounce: Duration,
    pub draft_debounce: Duration,
    pub draft_ttl: Duration,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let environment = parse_environment(env::var("APP_ENV").ok().as_deref())?;
        let log_format = parse_log_format(env::var("LOG_FORMAT").ok().as_deref())?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            environment,
            log_level: env::var("LOG_LEVEL").ok(),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            refresh_debounce: Duration::from_millis(parse_or_default("REFRESH_DEBOUNCE_MS", 0)?),
            draft_debounce: Duration::from_millis(parse_or_default("DRAFT_DEBOUNCE_MS", 500)?),
            draft_ttl: Duration::from_secs(parse_or_default("DRAFT_TTL_SECS", 8 * 60 * 60)?),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
        })
    }

    /// Debug and info output is suppressed in production unless `LOG_LEVEL` says otherwise.
    pub fn log_filter(&self) -> String {
        match (&self.log_level, self.environment) {
            (Some(level), _) => level.clone(),
            (None, Environment::Production) => "warn".to_string(),
            (None, Environment::Development) => "debug".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            environment: Environment::Development,
            log_level: None,
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            refresh_debounce: Duration::ZERO,
            draft_debounce: Duration::from_millis(500),
            draft_ttl: Duration::from_secs(8 * 60 * 60),
            static_dir: "static".to_string(),
        }
    }
}

fn parse_environment(raw: Option<&str>) -> Result<Environment, AppError> {
    match raw {
        Some("production") | Some("prod") => Ok(Environment::Production),
        Some("development") | Some("dev") | None => Ok(Environment::Development),
        Some(other) => Err(AppError::Internal(format!("invalid APP_ENV: {other}"))),
    }
}

fn parse_log_format(raw: Option<&str>) -> Result<LogFormat, AppError> {
    match raw {
        Some("json") => Ok(LogFormat::Json),
        Some("compact") | None => Ok(LogFormat::Compact),
        Some(other) => Err(AppError::Internal(format!("invalid LOG_FORMAT: {other}"))),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
