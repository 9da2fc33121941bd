use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::marketplace::ranking::RelevanceWeights;

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
    pub marketplace: MarketplaceConfig,
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
        let log_format = env::var("APP_LOG_FORMAT")
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();

        let marketplace = MarketplaceConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            marketplace,
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
    pub format: LogFormat,
}

/// Line format of the tracing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// Business dials for partner onboarding and search ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceConfig {
    /// Percentage applied to partners registered without an explicit rate.
    pub default_commission_rate: Decimal,
    pub relevance_weights: RelevanceWeights,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: Decimal::TEN,
            relevance_weights: RelevanceWeights::default(),
        }
    }
}

impl MarketplaceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("MARKETPLACE_DEFAULT_COMMISSION_RATE") {
            let rate = Decimal::from_str(raw.trim())
                .map_err(|_| ConfigError::InvalidCommissionRate(raw.clone()))?;
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(ConfigError::InvalidCommissionRate(raw));
            }
            config.default_commission_rate = rate;
        }

        if let Ok(raw) = env::var("MARKETPLACE_RELEVANCE_WEIGHTS") {
            config.relevance_weights = parse_weights(&raw)?;
        }

        Ok(config)
    }
}

fn parse_weights(raw: &str) -> Result<RelevanceWeights, ConfigError> {
    let parsed = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::InvalidRelevanceWeights(raw.to_string()))?;

    match parsed.as_slice() {
        [rating, proximity, reviews]
            if parsed.iter().all(|weight| weight.is_finite() && *weight >= 0.0) =>
        {
            Ok(RelevanceWeights {
                rating: *rating,
                proximity: *proximity,
                reviews: *reviews,
            })
        }
        _ => Err(ConfigError::InvalidRelevanceWeights(raw.to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCommissionRate(String),
    InvalidRelevanceWeights(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCommissionRate(value) => write!(
                f,
                "MARKETPLACE_DEFAULT_COMMISSION_RATE must be a percentage between 0 and 100 (got '{value}')"
            ),
            ConfigError::InvalidRelevanceWeights(value) => write!(
                f,
                "MARKETPLACE_RELEVANCE_WEIGHTS must be three non-negative numbers 'rating,proximity,reviews' (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_LOG_FORMAT");
        env::remove_var("MARKETPLACE_DEFAULT_COMMISSION_RATE");
        env::remove_var("MARKETPLACE_RELEVANCE_WEIGHTS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.marketplace, MarketplaceConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_marketplace_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_DEFAULT_COMMISSION_RATE", "12.5");
        env::set_var("MARKETPLACE_RELEVANCE_WEIGHTS", "0.6, 0.4, 0");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.marketplace.default_commission_rate,
            Decimal::new(125, 1)
        );
        assert_eq!(config.marketplace.relevance_weights.rating, 0.6);
        assert_eq!(config.marketplace.relevance_weights.reviews, 0.0);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_commission_rate() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_DEFAULT_COMMISSION_RATE", "120");
        let err = AppConfig::load().expect_err("rate above 100 rejected");
        assert!(matches!(err, ConfigError::InvalidCommissionRate(_)));
        reset_env();
    }

    #[test]
    fn reads_json_log_format() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOG_FORMAT", "JSON");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.telemetry.format, LogFormat::Json);
        reset_env();
    }

    #[test]
    fn rejects_malformed_weights() {
        assert!(parse_weights("0.5,0.5").is_err());
        assert!(parse_weights("0.5,-0.1,0.6").is_err());
        assert!(parse_weights("a,b,c").is_err());
    }
}
