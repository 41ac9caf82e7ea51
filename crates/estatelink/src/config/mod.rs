use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::matching::DEFAULT_MIN_SCORE;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_number("APP_PORT", 3000u16)?;
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Matching, validation, and scheduling policy knobs, grouped so library
/// consumers can construct them without the server-facing sections.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub validation: ValidationConfig,
    pub schedule: ScheduleConfig,
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            matching: MatchingConfig {
                min_score: env_number("MATCH_MIN_SCORE", DEFAULT_MIN_SCORE)?,
                instant_match_cap: env_number("MATCH_INSTANT_CAP", 5usize)?,
                digest_match_cap: env_number("MATCH_DIGEST_CAP", 5usize)?,
                digest_window_days: env_number("MATCH_DIGEST_WINDOW_DAYS", 5i64)?,
            },
            validation: ValidationConfig {
                stale_after_days: env_number("VALIDATION_STALE_DAYS", 7i64)?,
                confirm_window_hours: env_number("VALIDATION_CONFIRM_WINDOW_HOURS", 24i64)?,
            },
            schedule: ScheduleConfig {
                reminder_every: hours("SWEEP_REMINDER_EVERY_HOURS", 24 * 7)?,
                expiry_every: hours("SWEEP_EXPIRY_EVERY_HOURS", 24)?,
                expiry_initial_delay: hours("SWEEP_EXPIRY_DELAY_HOURS", 25)?,
                matches_every: hours("SWEEP_MATCHES_EVERY_HOURS", 24)?,
                digest_every: hours("SWEEP_DIGEST_EVERY_HOURS", 24)?,
            },
        })
    }
}

/// Match-quality policy shared by every fan-out path.
#[derive(Debug, Clone, Copy)]
pub struct MatchingConfig {
    /// Minimum compatibility percentage that counts as a match.
    pub min_score: u8,
    /// Matches included per recipient per instant trigger event.
    pub instant_match_cap: usize,
    /// Matches per direction included in the daily digest email.
    pub digest_match_cap: usize,
    /// Digest only considers entities created within this trailing window.
    pub digest_window_days: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            instant_match_cap: 5,
            digest_match_cap: 5,
            digest_window_days: 5,
        }
    }
}

/// Freshness policy for the validation lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct ValidationConfig {
    /// Entities unvalidated and unreminded for this long get a reminder.
    pub stale_after_days: i64,
    /// How long an issued token stays confirmable.
    pub confirm_window_hours: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 7,
            confirm_window_hours: 24,
        }
    }
}

/// Cadence of the recurring sweep jobs. The expiry job is delayed past the
/// confirm window so the first expiry pass never fires before a full 24h
/// window has elapsed since the reminders went out.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub reminder_every: Duration,
    pub expiry_every: Duration,
    pub expiry_initial_delay: Duration,
    pub matches_every: Duration,
    pub digest_every: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reminder_every: Duration::from_secs(7 * 24 * 3600),
            expiry_every: Duration::from_secs(24 * 3600),
            expiry_initial_delay: Duration::from_secs(25 * 3600),
            matches_every: Duration::from_secs(24 * 3600),
            digest_every: Duration::from_secs(24 * 3600),
        }
    }
}

fn env_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber {
                key,
                value: raw.clone(),
            }),
        Err(_) => Ok(default),
    }
}

fn hours(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(env_number(key, default)? * 3600))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a number, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidNumber { .. } => None,
        }
    }
}
