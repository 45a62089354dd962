//! Client configuration structs
//!
//! Loads configuration from environment variables, or builds it in code.

use serde::Deserialize;
use shardline_core::{Intents, Token};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub token: Token,
    pub intents: Intents,
    pub shards: ShardCount,
    /// Run only these shard ids (all shards when `None`)
    pub shard_ids: Option<Vec<u32>>,
    pub http: HttpConfig,
    pub gateway: GatewayConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Desired number of gateway shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardCount {
    /// Use the recommendation from the gateway descriptor
    #[default]
    Auto,
    Fixed(u32),
}

impl FromStr for ShardCount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }

        match s.parse::<u32>() {
            Ok(count) if count > 0 => Ok(Self::Fixed(count)),
            _ => Err(ConfigError::InvalidValue("SHARDLINE_SHARDS", s.to_string())),
        }
    }
}

/// REST client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub api_base: String,
    pub user_agent: String,
    /// Retries for 5xx responses and transport failures
    pub max_retries: u32,
    /// Retries for 429 responses before the caller sees an error
    pub max_rate_limit_retries: u32,
    pub timeout: Duration,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub version: u8,
    pub large_threshold: Option<u8>,
    pub identify_spacing: Duration,
    pub hello_timeout: Duration,
}

// Default value functions
fn default_app_name() -> String {
    "shardline".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    format!(
        "DiscordBot (https://github.com/shardline/shardline, {})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_gateway_version() -> u8 {
    10
}

fn default_identify_spacing_ms() -> u64 {
    5_000
}

fn default_hello_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_rate_limit_retries() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: default_gateway_version(),
            large_threshold: None,
            identify_spacing: Duration::from_millis(default_identify_spacing_ms()),
            hello_timeout: Duration::from_millis(default_hello_timeout_ms()),
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default),
    }
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            token,
            intents: Intents::default(),
            shards: ShardCount::Auto,
            shard_ids: None,
            http: HttpConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }

    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_shards(mut self, shards: ShardCount) -> Self {
        self.shards = shards;
        self
    }

    #[must_use]
    pub fn with_shard_ids(mut self, shard_ids: Vec<u32>) -> Self {
        self.shard_ids = Some(shard_ids);
        self
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.http.api_base = api_base.into();
        self
    }

    #[must_use]
    pub fn with_identify_spacing(mut self, spacing: Duration) -> Self {
        self.gateway.identify_spacing = spacing;
        self
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `SHARDLINE_TOKEN` is missing or any value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_token =
            env::var("SHARDLINE_TOKEN").map_err(|_| ConfigError::MissingVar("SHARDLINE_TOKEN"))?;
        let token = Token::parse(&raw_token)
            .map_err(|e| ConfigError::InvalidValue("SHARDLINE_TOKEN", e.to_string()))?;

        let large_threshold = match env::var("SHARDLINE_LARGE_THRESHOLD") {
            Ok(raw) => match raw.trim().parse::<u8>() {
                Ok(value) if (50..=250).contains(&value) => Some(value),
                _ => return Err(ConfigError::InvalidValue("SHARDLINE_LARGE_THRESHOLD", raw)),
            },
            Err(_) => None,
        };

        let shard_ids = match env::var("SHARDLINE_SHARD_IDS") {
            Ok(raw) => Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<u32>().map_err(|_| {
                            ConfigError::InvalidValue("SHARDLINE_SHARD_IDS", raw.clone())
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            token,
            intents: Intents::from_bits_retain(parse_var(
                "SHARDLINE_INTENTS",
                Intents::default().bits(),
            )?),
            shards: parse_var("SHARDLINE_SHARDS", ShardCount::Auto)?,
            shard_ids,
            http: HttpConfig {
                api_base: env::var("SHARDLINE_API_BASE").unwrap_or_else(|_| default_api_base()),
                user_agent: default_user_agent(),
                max_retries: parse_var("SHARDLINE_HTTP_MAX_RETRIES", default_max_retries())?,
                max_rate_limit_retries: parse_var(
                    "SHARDLINE_HTTP_MAX_RATE_LIMIT_RETRIES",
                    default_max_rate_limit_retries(),
                )?,
                timeout: Duration::from_secs(parse_var(
                    "SHARDLINE_HTTP_TIMEOUT_SECS",
                    default_timeout_secs(),
                )?),
            },
            gateway: GatewayConfig {
                version: parse_var("SHARDLINE_GATEWAY_VERSION", default_gateway_version())?,
                large_threshold,
                identify_spacing: Duration::from_millis(parse_var(
                    "SHARDLINE_IDENTIFY_SPACING_MS",
                    default_identify_spacing_ms(),
                )?),
                hello_timeout: Duration::from_millis(parse_var(
                    "SHARDLINE_HELLO_TIMEOUT_MS",
                    default_hello_timeout_ms(),
                )?),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
