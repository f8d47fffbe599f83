//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ERP_BASE_URL` - Default ERP tenant URL (a user's company URL overrides it)
//!
//! ## Optional
//! - `ERP_API_APP` - App namespace of the whitelisted methods (default: `b2b_portal`)
//! - `ERP_CATALOG_CACHE_TTL_SECS` - Catalog cache TTL (default: 300)
//! - `ERP_CATALOG_CACHE_CAPACITY` - Catalog cache entries (default: 1000)
//! - `TRADEDESK_HOST` - Bind address (default: 127.0.0.1)
//! - `TRADEDESK_PORT` - Listen port (default: 3000)
//! - `TRADEDESK_STATE_DIR` - Session storage directory (default: `.tradedesk`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: `development`)
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

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
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the persisted session
    pub state_dir: PathBuf,
    /// ERP connection settings
    pub erp: ErpConfig,
    /// Error tracking settings
    pub sentry: SentryConfig,
}

/// ERP connection settings.
#[derive(Debug, Clone)]
pub struct ErpConfig {
    /// Default tenant URL
    pub base_url: Url,
    /// App namespace prefixed to every method name
    pub api_app: String,
    /// Catalog cache time-to-live in seconds
    pub catalog_cache_ttl_secs: u64,
    /// Maximum number of cached catalog entries
    pub catalog_cache_capacity: u64,
}

/// Sentry settings.
///
/// Implements `Debug` manually to redact the DSN.
#[derive(Clone)]
pub struct SentryConfig {
    /// DSN; Sentry stays off when unset
    pub dsn: Option<SecretString>,
    pub environment: String,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
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
        Self::from_vars(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: parse_or_default(vars, "TRADEDESK_HOST", "127.0.0.1")?,
            port: parse_or_default(vars, "TRADEDESK_PORT", "3000")?,
            state_dir: PathBuf::from(get_env_or_default(vars, "TRADEDESK_STATE_DIR", ".tradedesk")),
            erp: ErpConfig::from_vars(vars)?,
            sentry: SentryConfig::from_vars(vars)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ErpConfig {
    /// Load only the ERP settings (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_required_env(vars, "ERP_BASE_URL")?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ERP_BASE_URL".to_string(), e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "ERP_BASE_URL".to_string(),
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }

        Ok(Self {
            base_url,
            api_app: get_env_or_default(vars, "ERP_API_APP", "b2b_portal"),
            catalog_cache_ttl_secs: parse_or_default(vars, "ERP_CATALOG_CACHE_TTL_SECS", "300")?,
            catalog_cache_capacity: parse_or_default(vars, "ERP_CATALOG_CACHE_CAPACITY", "1000")?,
        })
    }
}

impl SentryConfig {
    fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env(vars, "SENTRY_DSN").map(SecretString::from),
            environment: get_env_or_default(vars, "SENTRY_ENVIRONMENT", "development"),
            sample_rate: parse_or_default(vars, "SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_or_default(vars, "SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional_env(vars, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(vars: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    vars(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(vars, key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_or_default<T>(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(vars, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
