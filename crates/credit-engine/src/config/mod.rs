use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

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
    pub policy: CreditPolicy,
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

        let log_level = env::var("CREDIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("CREDIT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let policy = CreditPolicy::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            policy,
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

/// Output layout for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Rules the credit engine enforces on awards, periods, and the multi-year target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPolicy {
    /// Upper bound for an award the reviewer sets explicitly.
    pub max_award: u32,
    pub min_period: i32,
    pub max_period: i32,
    pub cycle_target: u32,
    pub cycle_years: u32,
    /// Largest amount a single legacy row may carry.
    pub max_historical_credits: u32,
    /// Award for a completed learning-platform course that names no credit value.
    pub course_credits: u32,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            max_award: 50,
            min_period: 1900,
            max_period: 2100,
            cycle_target: 150,
            cycle_years: 3,
            max_historical_credits: 500,
            course_credits: 5,
        }
    }
}

impl CreditPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let policy = Self {
            max_award: env_number("CREDIT_MAX_AWARD", defaults.max_award)?,
            min_period: env_number("CREDIT_MIN_PERIOD", defaults.min_period)?,
            max_period: env_number("CREDIT_MAX_PERIOD", defaults.max_period)?,
            cycle_target: env_number("CREDIT_CYCLE_TARGET", defaults.cycle_target)?,
            cycle_years: env_number("CREDIT_CYCLE_YEARS", defaults.cycle_years)?,
            max_historical_credits: env_number(
                "CREDIT_MAX_HISTORICAL_CREDITS",
                defaults.max_historical_credits,
            )?,
            course_credits: env_number("CREDIT_COURSE_CREDITS", defaults.course_credits)?,
        };

        if policy.min_period > policy.max_period {
            return Err(ConfigError::InvalidPeriodBounds {
                min: policy.min_period,
                max: policy.max_period,
            });
        }
        if policy.cycle_years == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "CREDIT_CYCLE_YEARS",
            });
        }
        if policy.course_credits == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "CREDIT_COURSE_CREDITS",
            });
        }

        Ok(policy)
    }

    pub fn period_in_bounds(&self, period: i32) -> bool {
        (self.min_period..=self.max_period).contains(&period)
    }
}

fn env_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidPeriodBounds { min: i32, max: i32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a valid non-zero number")
            }
            ConfigError::InvalidPeriodBounds { min, max } => write!(
                f,
                "CREDIT_MIN_PERIOD ({min}) must not exceed CREDIT_MAX_PERIOD ({max})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidPeriodBounds { .. } => None,
        }
    }
}
