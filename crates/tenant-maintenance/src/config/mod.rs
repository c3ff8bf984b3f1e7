use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::maintenance::{BiddingPolicy, MatchPolicy};

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            maintenance: MaintenanceConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Dials for vendor recommendations and the bidding round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Minimum match score for a vendor to be shown as recommended.
    pub recommendation_threshold: u32,
    /// Days a bidding round accepts quotes; `None` keeps rounds open until awarded or closed.
    pub bidding_window_days: Option<u32>,
    /// How many times a quote submission is re-based after a concurrent RFP update.
    pub quote_conflict_retries: u8,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            recommendation_threshold: MatchPolicy::default().recommendation_threshold,
            bidding_window_days: None,
            quote_conflict_retries: BiddingPolicy::default().quote_conflict_retries,
        }
    }
}

impl MaintenanceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let recommendation_threshold = match env::var("MAINT_MATCH_THRESHOLD") {
            Ok(raw) => parse_number("MAINT_MATCH_THRESHOLD", &raw)?,
            Err(_) => defaults.recommendation_threshold,
        };

        let bidding_window_days = match env::var("MAINT_BIDDING_WINDOW_DAYS") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(parse_number("MAINT_BIDDING_WINDOW_DAYS", &raw)?),
            Err(_) => defaults.bidding_window_days,
        };

        let quote_conflict_retries = match env::var("MAINT_QUOTE_CONFLICT_RETRIES") {
            Ok(raw) => parse_number("MAINT_QUOTE_CONFLICT_RETRIES", &raw)?,
            Err(_) => defaults.quote_conflict_retries,
        };

        Ok(Self {
            recommendation_threshold,
            bidding_window_days,
            quote_conflict_retries,
        })
    }

    /// Scoring policy with the configured recommendation threshold applied.
    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy {
            recommendation_threshold: self.recommendation_threshold,
            ..MatchPolicy::default()
        }
    }

    pub fn bidding_policy(&self) -> BiddingPolicy {
        BiddingPolicy {
            bidding_window: self
                .bidding_window_days
                .map(|days| chrono::Duration::days(i64::from(days))),
            quote_conflict_retries: self.quote_conflict_retries,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
