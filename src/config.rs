use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub scorecard_window_days: i64,
    pub commission: CommissionConfig,
    pub sender: SenderConfig,
}

#[derive(Debug, Clone)]
pub struct CommissionConfig {
    pub enabled: bool,
    pub auto_charge: bool,
    pub rate: f64,
    pub absolute_tolerance: f64,
    pub percent_tolerance: f64,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_charge: true,
            rate: 0.30,
            absolute_tolerance: 25.0,
            percent_tolerance: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub attempt_timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 4_000,
            max_attempts: 3,
            backoff_ms: 500,
            breaker_threshold: 5,
            breaker_cooldown_ms: 60_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            scorecard_window_days: 30,
            commission: CommissionConfig::default(),
            sender: SenderConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            scorecard_window_days: parse_or_default("SCORECARD_WINDOW_DAYS", 30)?,
            commission: CommissionConfig {
                enabled: parse_or_default("COMMISSION_ENABLED", true)?,
                auto_charge: parse_or_default("AUTO_CHARGE_ENABLED", true)?,
                rate: parse_or_default("COMMISSION_RATE", 0.30)?,
                absolute_tolerance: parse_or_default("UNDER_REPORT_ABS_TOLERANCE", 25.0)?,
                percent_tolerance: parse_or_default("UNDER_REPORT_PCT_TOLERANCE", 0.15)?,
            },
            sender: SenderConfig {
                attempt_timeout_ms: parse_or_default("SEND_TIMEOUT_MS", 4_000)?,
                max_attempts: parse_or_default("SEND_MAX_ATTEMPTS", 3)?,
                backoff_ms: parse_or_default("SEND_BACKOFF_MS", 500)?,
                breaker_threshold: parse_or_default("BREAKER_THRESHOLD", 5)?,
                breaker_cooldown_ms: parse_or_default("BREAKER_COOLDOWN_MS", 60_000)?,
            },
        })
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
