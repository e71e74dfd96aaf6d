//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection
//!   string. Without it carts, orders and sessions are kept in memory.
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATA_DIR` - Local cart slot files (default: ./data)
//! - `CART_SYNC_DEBOUNCE_MS` - Quiet interval before a cart write (default: 800)
//! - `CART_HANDOFF_POLICY` - `replace` or `merge` (default: replace)
//! - `CART_HYDRATION_MODE` - `subscribe` or `read-once` (default: subscribe)
//! - `CART_PLACEHOLDER_IMAGE` - Image for products without one
//! - `CART_ENGINE_IDLE_SECS` - Idle time before a visitor's engine is
//!   dropped (default: 1800)
//! - `IDENTITY_HEADER_PREFIX` - Gateway identity header prefix
//!   (default: x-zenro-user)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::cart::{DEFAULT_PLACEHOLDER_IMAGE, EngineConfig, HandoffPolicy, HydrationMode};

/// Default gateway identity header prefix.
pub const DEFAULT_IDENTITY_HEADER_PREFIX: &str = "x-zenro-user";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Directory holding per-visitor local cart slots
    pub data_dir: PathBuf,
    /// Cart engine settings
    pub cart: CartConfig,
    /// Prefix of the identity headers set by the auth gateway
    pub identity_header_prefix: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    pub debounce: Duration,
    pub handoff: HandoffPolicy,
    pub hydration: HydrationMode,
    pub placeholder_image: String,
    pub engine_idle: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            debounce: engine.debounce,
            handoff: engine.handoff,
            hydration: engine.hydration,
            placeholder_image: engine.placeholder_image,
            engine_idle: Duration::from_secs(1800),
        }
    }
}

impl CartConfig {
    /// Settings for one engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: self.debounce,
            handoff: self.handoff,
            hydration: self.hydration,
            placeholder_image: self.placeholder_image.clone(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = env("STOREFRONT_DATABASE_URL")
            .or_else(|| env("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .map(SecretString::from);

        let host: IpAddr = parse_or_default(&env, "STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_or_default(&env, "STOREFRONT_PORT", "3000")?;

        let base_url = get_required_env(&env, "STOREFRONT_BASE_URL")?;
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_owned(), e.to_string()))?;

        let data_dir = PathBuf::from(get_env_or_default(&env, "STOREFRONT_DATA_DIR", "./data"));
        let cart = CartConfig::from_lookup(&env)?;
        let identity_header_prefix = get_env_or_default(
            &env,
            "IDENTITY_HEADER_PREFIX",
            DEFAULT_IDENTITY_HEADER_PREFIX,
        )
        .to_ascii_lowercase();

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            data_dir,
            cart,
            identity_header_prefix,
            sentry_dsn: env("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_or_default(&env, "SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_or_default(&env, "SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CartConfig {
    fn from_lookup(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let debounce_ms: u64 = parse_or_default(env, "CART_SYNC_DEBOUNCE_MS", "800")?;
        let idle_secs: u64 = parse_or_default(env, "CART_ENGINE_IDLE_SECS", "1800")?;

        let handoff = get_env_or_default(env, "CART_HANDOFF_POLICY", "replace");
        let handoff = HandoffPolicy::parse(&handoff).ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "CART_HANDOFF_POLICY".to_owned(),
                format!("expected `replace` or `merge`, got `{handoff}`"),
            )
        })?;

        let hydration = get_env_or_default(env, "CART_HYDRATION_MODE", "subscribe");
        let hydration = HydrationMode::parse(&hydration).ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "CART_HYDRATION_MODE".to_owned(),
                format!("expected `subscribe` or `read-once`, got `{hydration}`"),
            )
        })?;

        Ok(Self {
            debounce: Duration::from_millis(debounce_ms),
            handoff,
            hydration,
            placeholder_image: get_env_or_default(
                env,
                "CART_PLACEHOLDER_IMAGE",
                DEFAULT_PLACEHOLDER_IMAGE,
            ),
            engine_idle: Duration::from_secs(idle_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_or_default<T>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
}
