use crate::domain::{MarketSession, PriceChangeThresholds};
use chrono::{NaiveDate, NaiveTime};
use marketsockets::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Env var overriding `api.base_url`
pub const ENV_API_URL: &str = "MOCKMARKET_API_URL";
/// Env var overriding `socket.url`
pub const ENV_WS_URL: &str = "MOCKMARKET_WS_URL";
/// Bearer token; never read from YAML
pub const ENV_TOKEN: &str = "MOCKMARKET_TOKEN";
/// Trading account id; never read from YAML
pub const ENV_USER_ID: &str = "MOCKMARKET_USER_ID";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Terminal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub market_hours: MarketHoursConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bearer token from .env (not in YAML)
    #[serde(skip)]
    pub token: Option<String>,

    /// User id from .env (not in YAML)
    #[serde(skip)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: default_api_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    pub url: String,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Client ping interval; absent disables the heartbeat
    #[serde(default)]
    pub heartbeat_secs: Option<u64>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            heartbeat_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Rupees
    #[serde(default = "default_absolute_threshold")]
    pub absolute_threshold: f64,
    /// Percent of the displayed price
    #[serde(default = "default_relative_threshold")]
    pub relative_threshold_percent: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            absolute_threshold: default_absolute_threshold(),
            relative_threshold_percent: default_relative_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketHoursConfig {
    /// IST, "HH:MM"
    #[serde(default = "default_open")]
    pub open: String,
    /// IST, "HH:MM"
    #[serde(default = "default_close")]
    pub close: String,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            open: default_open(),
            close: default_close(),
            holidays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_movers_secs")]
    pub movers_secs: u64,
    #[serde(default = "default_news_secs")]
    pub news_secs: u64,
    #[serde(default = "default_sentiment_secs")]
    pub sentiment_secs: u64,
    /// Ceiling for the failure backoff of every poller
    #[serde(default = "default_poll_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            movers_secs: default_movers_secs(),
            news_secs: default_news_secs(),
            sentiment_secs: default_sentiment_secs(),
            max_backoff_secs: default_poll_backoff_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_timeout() -> u64 {
    15
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_absolute_threshold() -> f64 {
    2.0
}

fn default_relative_threshold() -> f64 {
    0.5
}

fn default_open() -> String {
    "09:15".to_string()
}

fn default_close() -> String {
    "15:30".to_string()
}

fn default_movers_secs() -> u64 {
    30
}

fn default_news_secs() -> u64 {
    300
}

fn default_sentiment_secs() -> u64 {
    600
}

fn default_poll_backoff_secs() -> u64 {
    300
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            socket: SocketConfig::default(),
            order: OrderConfig::default(),
            market_hours: MarketHoursConfig::default(),
            polling: PollingConfig::default(),
            log_level: default_log_level(),
            token: None,
            user_id: None,
        }
    }
}

impl TerminalConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::parse(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        config.apply_env_with(|key| std::env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file means all defaults
    pub fn load_or_default(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        info!("Config file {} not found, using defaults", path.display());
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML only: no env overrides, no validation
    pub fn parse(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `MOCKMARKET_*` overrides from `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            info!("Overriding API URL from environment variable");
            self.api.base_url = url;
        }
        if let Some(url) = lookup(ENV_WS_URL) {
            info!("Overriding WebSocket URL from environment variable");
            self.socket.url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            self.user_id = Some(user_id);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.socket.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "socket.url cannot be empty".to_string(),
            ));
        }

        if !(self.socket.url.starts_with("ws://") || self.socket.url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(
                "socket.url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.socket.initial_backoff_ms == 0 {
            return Err(ConfigError::ValidationError(
                "socket.initial_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.socket.max_backoff_ms < self.socket.initial_backoff_ms {
            return Err(ConfigError::ValidationError(
                "socket.max_backoff_ms must be >= socket.initial_backoff_ms".to_string(),
            ));
        }

        if self.socket.heartbeat_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "socket.heartbeat_secs must be greater than 0 when set".to_string(),
            ));
        }

        if !is_positive(self.order.absolute_threshold) {
            return Err(ConfigError::ValidationError(
                "order.absolute_threshold must be positive".to_string(),
            ));
        }

        if !is_positive(self.order.relative_threshold_percent) {
            return Err(ConfigError::ValidationError(
                "order.relative_threshold_percent must be positive".to_string(),
            ));
        }

        let session = self.session()?;
        if session.open_time() >= session.close_time() {
            return Err(ConfigError::ValidationError(
                "market_hours.open must be before market_hours.close".to_string(),
            ));
        }

        let polling = &self.polling;
        if polling.movers_secs == 0 || polling.news_secs == 0 || polling.sentiment_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling intervals must be greater than 0".to_string(),
            ));
        }

        let shortest = polling.movers_secs.min(polling.news_secs).min(polling.sentiment_secs);
        if polling.max_backoff_secs < shortest {
            return Err(ConfigError::ValidationError(
                "polling.max_backoff_secs must be >= the shortest polling interval".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Trading session in IST
    pub fn session(&self) -> Result<MarketSession> {
        let open = parse_time("market_hours.open", &self.market_hours.open)?;
        let close = parse_time("market_hours.close", &self.market_hours.close)?;
        Ok(MarketSession::new(open, close).with_holidays(self.market_hours.holidays.iter().copied()))
    }

    pub fn thresholds(&self) -> PriceChangeThresholds {
        PriceChangeThresholds {
            absolute: self.order.absolute_threshold,
            relative_percent: self.order.relative_threshold_percent,
        }
    }

    /// Reconnect forever between the configured backoff bounds
    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::unbounded(
            Duration::from_millis(self.socket.initial_backoff_ms),
            Duration::from_millis(self.socket.max_backoff_ms),
        )
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Token, or an error naming the env var to set
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing(ENV_TOKEN.to_string()))
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API URL: {}", self.api.base_url);
        info!("  WebSocket URL: {}", self.socket.url);
        info!(
            "  Reconnect backoff: {}ms .. {}ms",
            self.socket.initial_backoff_ms, self.socket.max_backoff_ms
        );
        info!(
            "  Price-change thresholds: Rs {:.2} / {:.2}%",
            self.order.absolute_threshold, self.order.relative_threshold_percent
        );
        info!(
            "  Market hours (IST): {} - {} ({} holidays)",
            self.market_hours.open,
            self.market_hours.close,
            self.market_hours.holidays.len()
        );
        info!(
            "  Polling: movers {}s, news {}s, sentiment {}s",
            self.polling.movers_secs, self.polling.news_secs, self.polling.sentiment_secs
        );
        info!("  Log level: {}", self.log_level);
        info!("  Token: {}", if self.token.is_some() { "set" } else { "not set" });
        info!("  User id: {}", self.user_id.as_deref().unwrap_or("not set"));
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|_| ConfigError::ValidationError(format!("{} must be HH:MM, got '{}'", field, value)))
}
